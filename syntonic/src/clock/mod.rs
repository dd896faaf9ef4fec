//! The clock aggregator: owns the ports, elects the best master across
//! them, feeds synchronization samples into the servo, disciplines the
//! timekeeper and routes management messages.
//!
//! Everything runs single threaded around one blocking [`poll`] call in
//! [`ClockCore::poll`]; ports, servo and timekeeper are only ever touched
//! between two suspensions.
//!
//! [`poll`]: libc::poll

use std::cmp::Ordering;
use std::io;
use std::os::unix::io::RawFd;

use log::{debug, error, info, warn};

use crate::bmc::{self, Dataset};
use crate::config::{ClockConfig, InterfaceConfig};
use crate::datastructures::common::{
    ClockIdentity, PortIdentity, PtpText, TimeFlags, TimeInterval, TimeSource, WireTimestamp,
};
use crate::datastructures::datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS, TimeStatus};
use crate::datastructures::messages::{
    ManagementAction, ManagementErrorId, ManagementId, ManagementMsg, Tlv,
};
use crate::datastructures::WireFormat;
use crate::filters::{MovingAverage, Stats};
use crate::port::{
    ForeignClock, FsmEvent, Port, PortAction, PortActions, PortState, N_PORT_FDS,
};
use crate::servo::{Servo, ServoState};
use crate::time::{Tmv, NS_PER_SEC};
use crate::timekeeper::Timekeeper;

/// Upper bound on the number of data ports of one clock.
pub const MAX_PORTS: usize = 8;

/// TAI minus UTC in seconds, as of 2017. The compiled-in floor for
/// announced UTC offsets.
pub const CURRENT_UTC_OFFSET: i16 = 37;

/// Descriptor slots per port in the poll vector: the port's own slots
/// plus one for its fault timer.
const N_CLOCK_PFD: usize = N_PORT_FDS + 1;

/// Window length of the path delay moving average.
const MAVE_LENGTH: usize = 10;

const POW2_41: f64 = (1u64 << 41) as f64;

const POLL_EVENTS: libc::c_short = libc::POLLIN | libc::POLLPRI;

/// Errors that can occur while bringing the aggregator up. Operational
/// failures after construction are logged and confined instead.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("no ports")]
    NoPorts,
    #[error("too many ports: {0}, the limit is {MAX_PORTS}")]
    TooManyPorts(usize),
    #[error("failed to create fault timer: {0}")]
    FaultTimer(io::Error),
}

/// Master/local frequency ratio estimation over a window of sync
/// messages, used while free running.
#[derive(Debug, Default)]
struct FreqEstimator {
    origin1: Tmv,
    ingress1: Tmv,
    max_count: u32,
    count: u32,
}

struct ClockStats {
    offset: Stats,
    freq: Stats,
    delay: Stats,
    max_count: u32,
}

/// The clock-wide best master: which port it was learned on plus the
/// snapshot that port handed out. Recomputed on every state decision, so
/// it cannot outlive the announce data it was taken from.
struct BestMaster {
    port: usize,
    foreign: ForeignClock,
}

/// An IEEE 1588 ordinary/boundary clock.
///
/// Owns the data ports plus the local management endpoint, the servo and
/// the timekeeper. Drive it by calling [`poll`](ClockCore::poll) in a
/// loop until shutdown.
pub struct ClockCore {
    dds: DefaultDS,
    cur: CurrentDS,
    dad: ParentDS,
    tds: TimePropertiesDS,
    status: TimeStatus,
    desc: String,

    servo: Box<dyn Servo>,
    timekeeper: Box<dyn Timekeeper>,

    /// Data ports first, the management endpoint last.
    ports: Vec<Box<dyn Port>>,
    nports: usize,
    pollfd: Vec<libc::pollfd>,
    fault_fd: Vec<RawFd>,
    fault_timeout: Vec<i8>,
    fault_armed: Vec<bool>,

    free_running: bool,
    utc_timescale: bool,
    freq_est_interval: i32,
    stats_interval: i32,

    fest: FreqEstimator,
    stats: ClockStats,
    avg_delay: MovingAverage,
    path_delay: Tmv,
    master_offset: Tmv,
    nrr: f64,
    c1: Tmv,
    c2: Tmv,
    t1: Tmv,
    t2: Tmv,

    best: Option<BestMaster>,
    best_id: Option<ClockIdentity>,
}

impl ClockCore {
    /// Build the aggregator from its collaborators.
    ///
    /// `data_ports` pairs every opened port with the interface options it
    /// was opened for; the fault back-off exponent is seeded from there.
    /// The `management` port is the local endpoint and is polled after
    /// all data ports.
    pub fn new(
        config: &ClockConfig,
        data_ports: Vec<(Box<dyn Port>, InterfaceConfig)>,
        management: Box<dyn Port>,
        servo: Box<dyn Servo>,
        timekeeper: Box<dyn Timekeeper>,
    ) -> Result<ClockCore, ClockError> {
        let nports = data_ports.len();
        if nports == 0 {
            return Err(ClockError::NoPorts);
        }
        if nports > MAX_PORTS {
            return Err(ClockError::TooManyPorts(nports));
        }

        let dds = DefaultDS {
            clock_identity: config.identity,
            number_ports: nports as u16,
            clock_quality: config.clock_quality,
            priority1: config.priority1,
            priority2: config.priority2,
            domain_number: config.domain_number,
            slave_only: config.slave_only,
            two_step: config.two_step,
        };

        let mut ports = Vec::with_capacity(nports + 1);
        let mut fault_timeout = Vec::with_capacity(nports);
        for (port, iface) in data_ports {
            ports.push(port);
            fault_timeout.push(iface.fault_reset_interval);
        }
        ports.push(management);

        let mut fault_fd = Vec::with_capacity(nports);
        for _ in 0..nports {
            let fd = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, 0) };
            if fd < 0 {
                let err = io::Error::last_os_error();
                for fd in fault_fd {
                    unsafe { libc::close(fd) };
                }
                return Err(ClockError::FaultTimer(err));
            }
            fault_fd.push(fd);
        }

        let pollfd = vec![
            libc::pollfd {
                fd: -1,
                events: 0,
                revents: 0,
            };
            (nports + 1) * N_CLOCK_PFD
        ];

        let mut clock = ClockCore {
            dds,
            cur: CurrentDS::default(),
            dad: ParentDS::new(
                config.identity,
                config.clock_quality,
                config.priority1,
                config.priority2,
            ),
            tds: TimePropertiesDS::default(),
            status: TimeStatus::default(),
            desc: config.user_description.clone(),
            servo,
            timekeeper,
            ports,
            nports,
            pollfd,
            fault_fd,
            fault_armed: vec![false; fault_timeout.len()],
            fault_timeout,
            free_running: config.free_running,
            utc_timescale: config.utc_timescale,
            freq_est_interval: config.freq_est_interval,
            stats_interval: config.stats_interval,
            fest: FreqEstimator::default(),
            stats: ClockStats {
                offset: Stats::new(),
                freq: Stats::new(),
                delay: Stats::new(),
                max_count: 0,
            },
            avg_delay: MovingAverage::new(MAVE_LENGTH),
            path_delay: Tmv::ZERO,
            master_offset: Tmv::ZERO,
            nrr: 1.0,
            c1: Tmv::ZERO,
            c2: Tmv::ZERO,
            t1: Tmv::ZERO,
            t2: Tmv::ZERO,
            best: None,
            best_id: None,
        };

        clock.update_grandmaster();

        for i in 0..clock.nports {
            let k = N_CLOCK_PFD * i + N_PORT_FDS;
            clock.pollfd[k].fd = clock.fault_fd[i];
            clock.pollfd[k].events = POLL_EVENTS;
        }

        clock.sync_interval(0);

        for i in 0..=clock.nports {
            clock.ports[i].dispatch(FsmEvent::Initialize, false);
            clock.install_fda(i);
        }

        Ok(clock)
    }

    /// One pass of the event loop: block until any descriptor becomes
    /// readable, service every port in registration order, then run the
    /// deferred master-lost and state-decision handling.
    ///
    /// `EINTR` is a benign wakeup. Only a broken poll vector is fatal.
    pub fn poll(&mut self) -> io::Result<()> {
        let cnt = unsafe {
            libc::poll(
                self.pollfd.as_mut_ptr(),
                self.pollfd.len() as libc::nfds_t,
                -1,
            )
        };
        if cnt < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(());
            }
            error!("poll failed");
            return Err(err);
        } else if cnt == 0 {
            return Ok(());
        }

        let mut lost = false;
        let mut sde = false;
        let mut actions = PortActions::new();

        for i in 0..self.nports {
            // Let the port handle its events.
            for j in 0..N_PORT_FDS {
                let k = N_CLOCK_PFD * i + j;
                if (self.pollfd[k].revents & POLL_EVENTS) == 0 {
                    continue;
                }
                actions.clear();
                let event = self.ports[i].event(j, &mut actions);
                for action in actions.drain(..) {
                    self.process_action(i, action);
                }
                if event == FsmEvent::StateDecision {
                    sde = true;
                }
                if event == FsmEvent::AnnounceReceiptTimeout {
                    lost = true;
                }
                self.ports[i].dispatch(event, false);
                self.install_fda(i);
                // Clear any fault after a little while.
                if self.ports[i].state() == PortState::Faulty {
                    self.fault_timeout(i, true);
                    break;
                }
            }

            // Check the fault timer.
            let k = N_CLOCK_PFD * i + N_PORT_FDS;
            if (self.pollfd[k].revents & POLL_EVENTS) != 0 {
                self.fault_timeout(i, false);
                self.ports[i].dispatch(FsmEvent::FaultCleared, false);
                self.install_fda(i);
            }
        }

        // Check the management endpoint. Its events are read, and the
        // management messages they carry are routed, but the returned fsm
        // event is dropped.
        // TODO: decide whether endpoint events should go through the
        // state machine like any other port's.
        for j in 0..N_PORT_FDS {
            let k = N_CLOCK_PFD * self.nports + j;
            if (self.pollfd[k].revents & POLL_EVENTS) == 0 {
                continue;
            }
            actions.clear();
            let _ = self.ports[self.nports].event(j, &mut actions);
            for action in actions.drain(..) {
                self.process_action(self.nports, action);
            }
        }

        if lost && self.master_lost() {
            self.update_grandmaster();
        }
        if sde {
            self.handle_state_decision_event();
        }

        Ok(())
    }

    fn process_action(&mut self, index: usize, action: PortAction) {
        match action {
            PortAction::Sync(s) => {
                self.synchronize(s.ingress, s.origin, s.correction1, s.correction2);
            }
            PortAction::Delay(d) => self.path_delay(d.request, d.response, d.correction),
            PortAction::PeerDelay {
                delay,
                neighbor_rate_ratio,
            } => self.peer_delay(delay, neighbor_rate_ratio),
            PortAction::FollowUpInfo(f) => self.follow_up_info(f),
            PortAction::SyncIntervalChanged { log_interval } => self.sync_interval(log_interval),
            PortAction::Management(msg) => self.manage(index, &msg),
        }
    }

    /// Refresh the poll-vector slots of one port from its current
    /// descriptor set. Slot positions are stable for the port's lifetime.
    pub fn install_fda(&mut self, index: usize) {
        let fds = self.ports[index].fds();
        for (j, fd) in fds.iter().enumerate() {
            let k = N_CLOCK_PFD * index + j;
            self.pollfd[k].fd = *fd;
            self.pollfd[k].events = POLL_EVENTS;
        }
    }

    /// Clear the poll-vector slots of one port. The slots stay reserved;
    /// the vector never compacts.
    pub fn remove_fda(&mut self, index: usize) {
        for j in 0..N_PORT_FDS {
            let k = N_CLOCK_PFD * index + j;
            self.pollfd[k].fd = -1;
            self.pollfd[k].events = 0;
        }
    }

    /// Arm (or disarm) the one-shot fault timer of a port. Repeated
    /// faults while armed must not push the expiry out, so re-arming is
    /// a no-op.
    fn fault_timeout(&mut self, index: usize, set: bool) {
        if set && self.fault_armed[index] {
            return;
        }

        let mut value = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        if set {
            let log_seconds = self.fault_timeout[index];
            debug!(
                "waiting 2^{{{}}} seconds to clear fault on port {}",
                log_seconds, index
            );
            if log_seconds < 0 {
                value.tv_nsec = (NS_PER_SEC >> -log_seconds as i32) as libc::c_long;
            } else {
                value.tv_sec = 1 << log_seconds;
            }
        } else {
            debug!("clearing fault on port {}", index);
        }

        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: value,
        };
        let err = unsafe {
            libc::timerfd_settime(self.fault_fd[index], 0, &spec, core::ptr::null_mut())
        };
        if err < 0 {
            warn!(
                "failed to set fault timer on port {}: {}",
                index,
                io::Error::last_os_error()
            );
            return;
        }
        self.fault_armed[index] = set;
    }

    /// True when no port follows a master anymore.
    fn master_lost(&self) -> bool {
        !self.ports[..self.nports]
            .iter()
            .any(|p| p.state() == PortState::Slave)
    }

    /// Reset the parent and time-properties datasets to describe this
    /// clock as its own grandmaster.
    fn update_grandmaster(&mut self) {
        self.cur = CurrentDS::default();
        self.dad.path_trace.clear();
        self.dad.parent_port_identity = PortIdentity {
            clock_identity: self.dds.clock_identity,
            port_number: 0,
        };
        self.dad.grandmaster_identity = self.dds.clock_identity;
        self.dad.grandmaster_clock_quality = self.dds.clock_quality;
        self.dad.grandmaster_priority1 = self.dds.priority1;
        self.dad.grandmaster_priority2 = self.dds.priority2;
        self.tds.current_utc_offset = CURRENT_UTC_OFFSET;
        self.tds.flags = if self.utc_timescale {
            TimeFlags::empty()
        } else {
            TimeFlags::PTP_TIMESCALE
        };
        self.tds.time_source = TimeSource::InternalOscillator;
    }

    /// Take the parent and time properties from the most recent announce
    /// of the selected best master.
    fn update_slave(&mut self) {
        let Some(best) = &self.best else { return };
        let announce = &best.foreign.announce;

        self.cur.steps_removed = 1 + best.foreign.dataset.steps_removed;
        self.dad.parent_port_identity = best.foreign.dataset.sender;
        self.dad.grandmaster_identity = announce.grandmaster_identity;
        self.dad.grandmaster_clock_quality = announce.grandmaster_clock_quality;
        self.dad.grandmaster_priority1 = announce.grandmaster_priority1;
        self.dad.grandmaster_priority2 = announce.grandmaster_priority2;
        self.tds.current_utc_offset = announce.current_utc_offset;
        self.tds.flags = announce.flags;
        self.tds.time_source = announce.time_source;

        if !self.tds.flags.has(TimeFlags::PTP_TIMESCALE) {
            warn!("foreign master not using PTP timescale");
        }
        if self.tds.current_utc_offset < CURRENT_UTC_OFFSET {
            warn!("running in a temporal vortex");
        }
    }

    /// The master is TAI while the local clock counts UTC seconds; pull
    /// the leap-second offset into the measured value.
    fn utc_correct(&mut self) {
        if !self.utc_timescale {
            return;
        }
        if !self.tds.flags.has(TimeFlags::PTP_TIMESCALE) {
            return;
        }
        let seconds = if self.tds.flags.has(TimeFlags::UTC_OFF_VALID)
            && self.tds.flags.has(TimeFlags::TIME_TRACEABLE)
        {
            self.tds.current_utc_offset
        } else if self.tds.current_utc_offset > CURRENT_UTC_OFFSET {
            self.tds.current_utc_offset
        } else {
            CURRENT_UTC_OFFSET
        };
        self.master_offset = self.master_offset + Tmv::from_seconds(seconds as i64);
    }

    /// Feed one completed SYNC/FOLLOW_UP pair into the pipeline.
    ///
    /// Publishes the measured offset, then actuates the timekeeper as the
    /// servo demands. Without a path delay measurement the sample is not
    /// actionable and the servo stays untouched.
    pub fn synchronize(
        &mut self,
        ingress: Tmv,
        origin: WireTimestamp,
        correction1: i64,
        correction2: i64,
    ) -> ServoState {
        let origin = origin.to_tmv();

        self.t1 = origin;
        self.t2 = ingress;
        self.c1 = Tmv::from_correction(correction1);
        self.c2 = Tmv::from_correction(correction2);

        self.master_offset = ingress - (origin + self.path_delay + self.c1 + self.c2);

        self.utc_correct();

        self.cur.offset_from_master = TimeInterval::from(self.master_offset);

        if self.path_delay.is_zero() {
            return ServoState::Unlocked;
        }

        if self.free_running {
            return self.no_adjust();
        }

        let (adj, state) = self.servo.sample(self.master_offset, ingress);

        if self.stats.max_count > 1 {
            self.stats_update(self.master_offset.nanos(), adj);
        } else {
            info!(
                "master offset {:>10} s{} freq {:+7.0} path delay {:>9}",
                self.master_offset, state, adj, self.path_delay
            );
        }

        match state {
            ServoState::Unlocked => {}
            ServoState::Jump => {
                self.write_ppb(-adj);
                self.step_clock(-self.master_offset.nanos());
                self.t1 = Tmv::ZERO;
                self.t2 = Tmv::ZERO;
            }
            ServoState::Locked => {
                self.write_ppb(-adj);
            }
        }
        state
    }

    /// Estimate the master/local frequency ratio without actuating
    /// anything. According to the master's clock the sync arrived at
    /// `origin_ts + path_delay + correction`; the path delay is assumed
    /// constant and left out so its measurement error cancels.
    fn no_adjust(&mut self) -> ServoState {
        let state = ServoState::Unlocked;

        if self.fest.ingress1.is_zero() {
            self.fest.ingress1 = self.t2;
            self.fest.origin1 = self.t1 + self.c1 + self.c2;
            return state;
        }

        self.fest.count += 1;
        if self.fest.count < self.fest.max_count {
            return state;
        }

        if self.t2 == self.fest.ingress1 {
            warn!("bad timestamps in rate ratio calculation");
            return state;
        }

        let origin2 = self.t1 + self.c1 + self.c2;

        let ratio =
            (origin2 - self.fest.origin1).as_f64() / (self.t2 - self.fest.ingress1).as_f64();
        let freq = (1.0 - ratio) * 1e9;

        if self.stats.max_count > 1 {
            self.stats_update(self.master_offset.nanos(), freq);
        } else {
            info!(
                "master offset {:>10} s{} freq {:+7.0} path delay {:>9}",
                self.master_offset, state, freq, self.path_delay
            );
        }

        let fui = 1.0 + self.status.cumulative_scaled_rate_offset as f64 / POW2_41;

        debug!("peer/local    {:.9}", self.nrr);
        debug!("fup_info      {:.9}", fui);
        debug!("product       {:.9}", fui * self.nrr);
        debug!("sum-1         {:.9}", fui + self.nrr - 1.0);
        debug!("master/local  {:.9}", ratio);
        debug!("diff         {:+.9}", ratio - (fui + self.nrr - 1.0));

        self.fest.ingress1 = self.t2;
        self.fest.origin1 = origin2;
        self.fest.count = 0;

        state
    }

    fn freq_est_reset(&mut self) {
        self.fest.origin1 = Tmv::ZERO;
        self.fest.ingress1 = Tmv::ZERO;
        self.fest.count = 0;
    }

    fn stats_update(&mut self, offset: i64, freq: f64) {
        self.stats.offset.add(offset as f64);
        self.stats.freq.add(freq);

        if self.stats.offset.len() < self.stats.max_count {
            return;
        }

        let (Some(offset_stats), Some(freq_stats)) =
            (self.stats.offset.result(), self.stats.freq.result())
        else {
            return;
        };

        // Path delay stats are updated separately, they may be empty.
        match self.stats.delay.result() {
            Some(delay_stats) => info!(
                "rms {:4.0} max {:4.0} freq {:+6.0} +/- {:3.0} delay {:5.0} +/- {:3.0}",
                offset_stats.rms,
                offset_stats.max_abs,
                freq_stats.mean,
                freq_stats.stddev,
                delay_stats.mean,
                delay_stats.stddev
            ),
            None => info!(
                "rms {:4.0} max {:4.0} freq {:+6.0} +/- {:3.0}",
                offset_stats.rms, offset_stats.max_abs, freq_stats.mean, freq_stats.stddev
            ),
        }

        self.stats.offset.reset();
        self.stats.freq.reset();
        self.stats.delay.reset();
    }

    fn write_ppb(&mut self, ppb: f64) {
        if let Err(err) = self.timekeeper.write_ppb(ppb) {
            warn!("failed to adjust the clock: {}", err);
        }
    }

    fn step_clock(&mut self, nanos: i64) {
        if let Err(err) = self.timekeeper.step(nanos) {
            warn!("failed to step clock: {}", err);
        }
    }

    /// Feed one completed delay request/response exchange into the path
    /// delay estimate (end-to-end delay mechanism).
    pub fn path_delay(&mut self, request: Tmv, response: WireTimestamp, correction: i64) {
        if self.t1.is_zero() {
            return;
        }

        let c1 = self.c1;
        let c2 = self.c2;
        let c3 = Tmv::from_correction(correction);
        let t1 = self.t1;
        let t2 = self.t2;
        let t3 = request;
        let t4 = response.to_tmv();

        let pd = ((t2 - t3) + (t4 - t1) - (c1 + c2 + c3)).div(2);

        if pd < Tmv::ZERO {
            warn!("negative path delay {:>10}", pd);
            warn!("path_delay = ((t2 - t3) + (t4 - t1) - (c1 + c2 + c3)) / 2");
            warn!("t2 - t3 = {:>+10}", t2 - t3);
            warn!("t4 - t1 = {:>+10}", t4 - t1);
            warn!("c1 {:>10}", c1);
            warn!("c2 {:>10}", c2);
            warn!("c3 {:>10}", c3);
        }

        self.path_delay = self.avg_delay.accumulate(pd);
        self.cur.mean_path_delay = TimeInterval::from(self.path_delay);

        debug!("path delay    {:>10} {:>10}", self.path_delay, pd);

        self.stats.delay.add(pd.nanos() as f64);
    }

    /// Store a peer path delay and neighbor rate ratio computed by a
    /// port (peer delay mechanism). The port already averages.
    pub fn peer_delay(&mut self, delay: Tmv, neighbor_rate_ratio: f64) {
        self.path_delay = delay;
        self.nrr = neighbor_rate_ratio;
        self.cur.mean_path_delay = TimeInterval::from(self.path_delay);

        self.stats.delay.add(delay.nanos() as f64);
    }

    /// Absorb the content of a FOLLOW_UP information TLV.
    pub fn follow_up_info(&mut self, info: crate::port::FollowUpInfo) {
        self.status.cumulative_scaled_rate_offset = info.cumulative_scaled_rate_offset;
        self.status.scaled_last_gm_phase_change = info.scaled_last_gm_phase_change;
        self.status.gm_time_base_indicator = info.gm_time_base_indicator;
        self.status.last_gm_phase_change = info.last_gm_phase_change;
    }

    /// Recalibrate the estimator and statistics windows for a new
    /// effective log2 sync interval.
    pub fn sync_interval(&mut self, n: i8) {
        let mut shift = self.freq_est_interval - n as i32;
        if shift < 0 {
            shift = 0;
        } else if shift >= 32 {
            shift = 31;
            warn!("freq_est_interval is too long");
        }
        self.fest.max_count = 1 << shift;

        let mut shift = self.stats_interval - n as i32;
        if shift < 0 {
            shift = 0;
        } else if shift >= 32 {
            shift = 31;
            warn!("summary_interval is too long");
        }
        self.stats.max_count = 1 << shift;
    }

    /// The comparison dataset describing this clock itself.
    pub fn default_dataset(&self) -> Dataset {
        let receiver = PortIdentity {
            clock_identity: self.dds.clock_identity,
            port_number: 0,
        };
        Dataset {
            priority1: self.dds.priority1,
            identity: self.dds.clock_identity,
            quality: self.dds.clock_quality,
            priority2: self.dds.priority2,
            steps_removed: 0,
            sender: receiver,
            receiver,
        }
    }

    /// Elect the clock-wide best master and drive the recommended state
    /// into every port. Runs at most once per poll pass.
    fn handle_state_decision_event(&mut self) {
        let mut best: Option<BestMaster> = None;
        for i in 0..self.nports {
            let Some(foreign) = self.ports[i].best_foreign() else {
                continue;
            };
            let better = match &best {
                Some(incumbent) => {
                    foreign
                        .dataset
                        .compare(&incumbent.foreign.dataset)
                        .as_ordering()
                        == Ordering::Greater
                }
                None => true,
            };
            if better {
                best = Some(BestMaster { port: i, foreign });
            }
        }

        let Some(best) = best else { return };

        info!("selected best master clock {}", best.foreign.dataset.identity);

        let fresh_best = self.best_id != Some(best.foreign.dataset.identity);
        if fresh_best {
            self.freq_est_reset();
            self.avg_delay.reset();
        }

        self.best_id = Some(best.foreign.dataset.identity);
        self.best = Some(best);

        let own = self.default_dataset();
        for i in 0..self.nports {
            let port_best = self.ports[i].best_foreign();
            let clock_best = self.best.as_ref().map(|b| b.foreign.dataset);
            let is_best_port = self.best.as_ref().map(|b| b.port) == Some(i);

            let recommended = bmc::state_decision(
                &own,
                clock_best.as_ref(),
                port_best.as_ref().map(|f| &f.dataset),
                self.ports[i].state(),
                is_best_port,
            );
            let event = match recommended {
                PortState::Listening => FsmEvent::None,
                PortState::GrandMaster => {
                    self.update_grandmaster();
                    FsmEvent::RsGrandMaster
                }
                PortState::Master => FsmEvent::RsMaster,
                PortState::Passive => FsmEvent::RsPassive,
                PortState::Slave => {
                    self.update_slave();
                    FsmEvent::RsSlave
                }
                _ => FsmEvent::FaultDetected,
            };
            self.ports[i].dispatch(event, fresh_best);
            self.install_fda(i);
        }
    }

    /// True when `index` takes part in management forwarding: any
    /// masterish or slaved state, or the management endpoint itself.
    fn forwarding(&self, index: usize) -> bool {
        if index == self.nports {
            return true;
        }
        matches!(
            self.ports[index].state(),
            PortState::Master
                | PortState::GrandMaster
                | PortState::Slave
                | PortState::Uncalibrated
                | PortState::PreMaster
        )
    }

    /// Route one management message received on port `index`: forward it
    /// out every other eligible port, then apply it to this clock and its
    /// ports.
    pub fn manage(&mut self, index: usize, msg: &ManagementMsg) {
        // Forward this message out all eligible ports.
        self.forward_management(index, msg);

        // Apply this message to the local clock and ports.
        let target = msg.target_port_identity.clock_identity;
        if target != ClockIdentity::WILDCARD && target != self.dds.clock_identity {
            return;
        }
        if msg.tlvs.len() != 1 {
            return;
        }
        let tlv = &msg.tlvs[0];
        let Some(id) = tlv.management_id() else {
            return;
        };

        // The codec accepts management TLVs with empty bodies to support
        // GETs and commands; at this point the body either matches the id
        // or is empty.
        match msg.action {
            ManagementAction::Get => {
                if !tlv.management_data().is_empty() {
                    self.management_send_error(index, msg, id, ManagementErrorId::WrongLength);
                    return;
                }
                if self.management_get_response(index, id, msg) {
                    return;
                }
            }
            ManagementAction::Set => {
                if tlv.management_data().is_empty() && id != ManagementId::NullManagement {
                    self.management_send_error(index, msg, id, ManagementErrorId::WrongLength);
                    return;
                }
                if self.management_set(index, id, msg) {
                    return;
                }
            }
            ManagementAction::Command => {
                if !tlv.management_data().is_empty() {
                    self.management_send_error(index, msg, id, ManagementErrorId::WrongLength);
                    return;
                }
            }
            _ => return,
        }

        if Self::clock_scope_responds(id) || CLOCK_SCOPE_UNSUPPORTED.contains(&id) {
            self.management_send_error(index, msg, id, ManagementErrorId::NotSupported);
            return;
        }

        for i in 0..self.nports {
            if self.ports[i].manage(msg) {
                break;
            }
        }
    }

    fn forward_management(&mut self, ingress: usize, msg: &ManagementMsg) {
        if !self.forwarding(ingress) || msg.boundary_hops == 0 {
            return;
        }
        // Serialize lazily, only when an eligible destination exists.
        let mut frame: Option<Vec<u8>> = None;
        for i in 0..=self.nports {
            if i == ingress || !self.forwarding(i) {
                continue;
            }
            if frame.is_none() {
                let mut fwd = msg.clone();
                fwd.boundary_hops -= 1;
                match fwd.serialize_vec() {
                    Ok(buf) => frame = Some(buf),
                    Err(err) => {
                        error!("failed to serialize management message: {}", err);
                        return;
                    }
                }
            }
            if let Some(buf) = &frame {
                if let Err(err) = self.ports[i].forward(buf) {
                    error!("port {}: management forward failed: {}", i, err);
                }
            }
        }
    }

    /// The ids this clock answers GETs for itself.
    fn clock_scope_responds(id: ManagementId) -> bool {
        matches!(
            id,
            ManagementId::UserDescription
                | ManagementId::DefaultDataSet
                | ManagementId::CurrentDataSet
                | ManagementId::ParentDataSet
                | ManagementId::TimePropertiesDataSet
                | ManagementId::TimeStatusNp
        )
    }

    fn management_get_response(
        &mut self,
        index: usize,
        id: ManagementId,
        req: &ManagementMsg,
    ) -> bool {
        let Some(mut data) = self.management_payload(id) else {
            return false;
        };
        if data.len() % 2 == 1 {
            data.push(0);
        }

        let mut rsp = self.management_reply(self.ports[index].identity(), req);
        rsp.tlvs.push(Tlv::management(id, &data));
        self.send_management(index, &rsp);
        true
    }

    /// GET payloads for the ids handled by the clock itself.
    fn management_payload(&self, id: ManagementId) -> Option<Vec<u8>> {
        let data = match id {
            ManagementId::UserDescription => serialize_wire(&PtpText::new(&self.desc)),
            ManagementId::DefaultDataSet => serialize_wire(&self.dds),
            ManagementId::CurrentDataSet => serialize_wire(&self.cur),
            ManagementId::ParentDataSet => serialize_wire(&self.dad),
            ManagementId::TimePropertiesDataSet => serialize_wire(&self.tds),
            ManagementId::TimeStatusNp => self.time_status_payload(),
            _ => return None,
        };
        Some(data)
    }

    fn time_status_payload(&self) -> Vec<u8> {
        let mut data = vec![0; 50];
        data[0..8].copy_from_slice(&self.master_offset.nanos().to_be_bytes());
        data[8..16].copy_from_slice(&self.t2.nanos().to_be_bytes());

        let cumulative = (self.status.cumulative_scaled_rate_offset as f64 + self.nrr * POW2_41
            - POW2_41) as i64 as u32;
        data[16..20].copy_from_slice(&cumulative.to_be_bytes());
        data[20..24].copy_from_slice(&self.status.scaled_last_gm_phase_change.to_be_bytes());
        data[24..26].copy_from_slice(&self.status.gm_time_base_indicator.to_be_bytes());
        self.status.last_gm_phase_change.serialize(&mut data[26..38]);

        let gm_present = self.dad.grandmaster_identity != self.dds.clock_identity;
        data[38..42].copy_from_slice(&(gm_present as u32).to_be_bytes());
        data[42..50].copy_from_slice(&self.dad.grandmaster_identity.0);
        data
    }

    /// SET handling. No id is settable here today: every SET falls
    /// through to the port offer like any other unhandled id.
    fn management_set(&mut self, index: usize, id: ManagementId, req: &ManagementMsg) -> bool {
        let respond = match id {
            _ => false,
        };
        if respond && !self.management_get_response(index, id, req) {
            error!("failed to send management set response");
        }
        respond
    }

    /// Skeleton of a response to `req`, sent from the port identified by
    /// `pid` back towards the requester.
    fn management_reply(&self, pid: PortIdentity, req: &ManagementMsg) -> ManagementMsg {
        let mut rsp = ManagementMsg::new(req.header.domain_number, ManagementAction::Response);
        rsp.header.source_port_identity = pid;
        rsp.header.sequence_id = req.header.sequence_id;
        rsp.target_port_identity = req.header.source_port_identity;
        rsp.starting_boundary_hops = req.starting_boundary_hops.wrapping_sub(req.boundary_hops);
        rsp.boundary_hops = rsp.starting_boundary_hops;
        rsp
    }

    fn management_send_error(
        &mut self,
        index: usize,
        req: &ManagementMsg,
        id: ManagementId,
        error: ManagementErrorId,
    ) {
        let mut rsp = self.management_reply(self.ports[index].identity(), req);
        rsp.tlvs.push(Tlv::management_error(error, id));
        if !self.send_management(index, &rsp) {
            error!("failed to send management error status");
        }
    }

    fn send_management(&mut self, index: usize, msg: &ManagementMsg) -> bool {
        let frame = match msg.serialize_vec() {
            Ok(frame) => frame,
            Err(err) => {
                error!("failed to serialize management message: {}", err);
                return false;
            }
        };
        match self.ports[index].forward(&frame) {
            Ok(()) => true,
            Err(err) => {
                error!("port {}: management send failed: {}", index, err);
                false
            }
        }
    }

    // Accessors used by ports, the BMC and observers.

    pub fn identity(&self) -> ClockIdentity {
        self.dds.clock_identity
    }

    pub fn domain_number(&self) -> u8 {
        self.dds.domain_number
    }

    pub fn clock_class(&self) -> u8 {
        self.dds.clock_quality.clock_class
    }

    pub fn slave_only(&self) -> bool {
        self.dds.slave_only
    }

    pub fn num_ports(&self) -> usize {
        self.nports
    }

    pub fn steps_removed(&self) -> u16 {
        self.cur.steps_removed
    }

    pub fn parent_identity(&self) -> PortIdentity {
        self.dad.parent_port_identity
    }

    pub fn current_dataset(&self) -> &CurrentDS {
        &self.cur
    }

    pub fn parent_dataset(&self) -> &ParentDS {
        &self.dad
    }

    pub fn time_properties(&self) -> &TimePropertiesDS {
        &self.tds
    }

    /// The dataset of the currently selected best foreign clock.
    pub fn best_foreign(&self) -> Option<&Dataset> {
        self.best.as_ref().map(|b| &b.foreign.dataset)
    }

    pub fn mean_path_delay(&self) -> Tmv {
        self.path_delay
    }
}

impl Drop for ClockCore {
    fn drop(&mut self) {
        for fd in &self.fault_fd {
            unsafe { libc::close(*fd) };
        }
    }
}

fn serialize_wire<T: WireFormat>(value: &T) -> Vec<u8> {
    let mut buffer = vec![0; value.wire_size()];
    value
        .serialize(&mut buffer)
        .expect("buffer is sized to fit");
    buffer
}

/// Clock-scope ids with no handler; requests that were not answered above
/// are refused rather than offered to the ports.
const CLOCK_SCOPE_UNSUPPORTED: &[ManagementId] = &[
    ManagementId::SaveInNonVolatileStorage,
    ManagementId::ResetNonVolatileStorage,
    ManagementId::Initialize,
    ManagementId::FaultLog,
    ManagementId::FaultLogReset,
    ManagementId::Priority1,
    ManagementId::Priority2,
    ManagementId::Domain,
    ManagementId::SlaveOnly,
    ManagementId::Time,
    ManagementId::ClockAccuracy,
    ManagementId::UtcProperties,
    ManagementId::TraceabilityProperties,
    ManagementId::TimescaleProperties,
    ManagementId::PathTraceList,
    ManagementId::PathTraceEnable,
    ManagementId::GrandmasterClusterTable,
    ManagementId::AcceptableMasterTable,
    ManagementId::AcceptableMasterMaxTableSize,
    ManagementId::AlternateTimeOffsetEnable,
    ManagementId::AlternateTimeOffsetName,
    ManagementId::AlternateTimeOffsetMaxKey,
    ManagementId::AlternateTimeOffsetProperties,
    ManagementId::TransparentClockDefaultDataSet,
    ManagementId::PrimaryDomain,
];
