//! The contract between the clock aggregator and its ports.
//!
//! A port owns its transport sockets, timers and per-port protocol state
//! machine. The aggregator only sees file descriptors to wait on, fsm
//! events to route, and the digested samples a port produces while being
//! serviced. Those samples travel in a small action buffer the aggregator
//! hands in when it services a readable descriptor, so a port never needs
//! a reference back into the clock.

use std::os::unix::io::RawFd;

use arrayvec::ArrayVec;

use crate::bmc::Dataset;
use crate::datastructures::common::{
    ClockIdentity, ClockQuality, PortIdentity, TimeFlags, TimeSource, WireTimestamp,
};
use crate::datastructures::datasets::ScaledNs;
use crate::datastructures::messages::ManagementMsg;
use crate::time::Tmv;

/// Number of descriptor slots every port exposes to the aggregator's poll
/// vector. Unused slots hold -1.
pub const N_PORT_FDS: usize = 7;

/// The descriptor set of one port.
pub type FdArray = [RawFd; N_PORT_FDS];

/// An [`FdArray`] with no descriptors installed.
pub const EMPTY_FDS: FdArray = [-1; N_PORT_FDS];

/// The states of the port state machine, *IEEE1588-2019 section 9.2.5*.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
    GrandMaster,
}

impl core::fmt::Display for PortState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PortState::Initializing => "INITIALIZING",
            PortState::Faulty => "FAULTY",
            PortState::Disabled => "DISABLED",
            PortState::Listening => "LISTENING",
            PortState::PreMaster => "PRE_MASTER",
            PortState::Master => "MASTER",
            PortState::Passive => "PASSIVE",
            PortState::Uncalibrated => "UNCALIBRATED",
            PortState::Slave => "SLAVE",
            PortState::GrandMaster => "GRAND_MASTER",
        };
        f.write_str(name)
    }
}

/// Events routed between the aggregator and the port state machines.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmEvent {
    None,
    Initialize,
    StateDecision,
    AnnounceReceiptTimeout,
    FaultDetected,
    FaultCleared,
    RsMaster,
    RsGrandMaster,
    RsSlave,
    RsPassive,
}

/// The announce content retained for the selected foreign clock; the
/// fields the aggregator copies into its parent and time-properties
/// datasets when it becomes a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceData {
    pub sender: PortIdentity,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority1: u8,
    pub grandmaster_priority2: u8,
    pub steps_removed: u16,
    pub current_utc_offset: i16,
    /// Octet 1 of the announce flag field, as received.
    pub flags: TimeFlags,
    pub time_source: TimeSource,
}

/// A foreign clock as handed to the aggregator: the comparison dataset
/// distilled from its qualified announce messages, plus the most recent
/// announce itself. The port keeps ownership of its announce queue; this
/// is a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignClock {
    pub dataset: Dataset,
    pub announce: AnnounceData,
}

/// A completed SYNC/FOLLOW_UP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSample {
    /// Local receipt time of the sync message.
    pub ingress: Tmv,
    /// The master's origin timestamp.
    pub origin: WireTimestamp,
    /// Raw correction field of the sync message (2^-16 ns units).
    pub correction1: i64,
    /// Raw correction field of the follow-up, zero for one-step masters.
    pub correction2: i64,
}

/// A completed DELAY_REQ/DELAY_RESP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySample {
    /// Local egress time of the delay request.
    pub request: Tmv,
    /// The master's receipt timestamp from the delay response.
    pub response: WireTimestamp,
    /// Raw correction field of the delay response.
    pub correction: i64,
}

/// Content of a FOLLOW_UP information TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowUpInfo {
    pub cumulative_scaled_rate_offset: i32,
    pub gm_time_base_indicator: u16,
    pub last_gm_phase_change: ScaledNs,
    pub scaled_last_gm_phase_change: i32,
}

/// Work a port asks of the clock while one of its descriptors is being
/// serviced.
#[derive(Debug, Clone)]
pub enum PortAction {
    /// Feed a synchronization sample into the servo pipeline.
    Sync(SyncSample),
    /// Feed a delay measurement into the path delay estimate.
    Delay(DelaySample),
    /// Store a peer-delay result computed by the port.
    PeerDelay {
        delay: Tmv,
        neighbor_rate_ratio: f64,
    },
    /// Absorb a FOLLOW_UP information TLV.
    FollowUpInfo(FollowUpInfo),
    /// The effective sync interval changed; recalibrate windows.
    SyncIntervalChanged { log_interval: i8 },
    /// Route a received management message.
    Management(ManagementMsg),
}

/// Buffer for the actions produced while servicing one descriptor.
pub type PortActions = ArrayVec<PortAction, 16>;

/// A PTP port as seen by the clock aggregator.
pub trait Port {
    fn identity(&self) -> PortIdentity;

    fn state(&self) -> PortState;

    /// The descriptors to multiplex for this port. Slot positions must be
    /// stable for the lifetime of the port; unused slots hold -1.
    fn fds(&self) -> FdArray;

    /// Service one readable descriptor slot. Samples and management
    /// messages produced along the way are pushed into `actions`; the
    /// return value is the event to drive back through
    /// [`dispatch`](Port::dispatch).
    fn event(&mut self, slot: usize, actions: &mut PortActions) -> FsmEvent;

    /// Drive the port state machine. `master_changed` tells the port that
    /// the clock selected a different best master in this decision pass.
    fn dispatch(&mut self, event: FsmEvent, master_changed: bool);

    /// Compute and return the best qualified foreign clock observed on
    /// this port, if any.
    fn best_foreign(&mut self) -> Option<ForeignClock>;

    /// Offer a port-scope management TLV. Returns true when this port
    /// handled it (including by answering with an error).
    fn manage(&mut self, msg: &ManagementMsg) -> bool;

    /// Transmit an already serialized PTP frame through this port's
    /// general message path.
    fn forward(&mut self, frame: &[u8]) -> std::io::Result<()>;
}
