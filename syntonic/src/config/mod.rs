//! Construction-time configuration of the clock aggregator.

use crate::datastructures::common::{ClockIdentity, ClockQuality};
use crate::servo::ServoKind;

/// How event messages are timestamped on the ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum TimestampingMode {
    #[default]
    Hardware,
    Software,
    /// Hardware timestamping through the older layer that cannot
    /// distinguish message types.
    Legacy,
}

/// The clock-wide options the aggregator consumes at construction.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub identity: ClockIdentity,
    pub domain_number: u8,
    pub priority1: u8,
    pub priority2: u8,
    pub clock_quality: ClockQuality,
    pub slave_only: bool,
    pub two_step: bool,
    /// Never actuate the timekeeper; only estimate the frequency ratio.
    pub free_running: bool,
    /// The local clock counts UTC seconds rather than TAI.
    pub utc_timescale: bool,
    /// log2 seconds basis of the frequency estimation window.
    pub freq_est_interval: i32,
    /// log2 seconds basis of the statistics window; <= 0 logs each sample.
    pub stats_interval: i32,
    /// Reported through the USER_DESCRIPTION management id.
    pub user_description: String,
    pub servo: ServoKind,
    pub timestamping: TimestampingMode,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            identity: ClockIdentity::default(),
            domain_number: 0,
            priority1: 128,
            priority2: 128,
            clock_quality: ClockQuality::default(),
            slave_only: false,
            two_step: true,
            free_running: false,
            utc_timescale: false,
            freq_est_interval: 1,
            stats_interval: 0,
            user_description: String::new(),
            servo: ServoKind::Pi,
            timestamping: TimestampingMode::Hardware,
        }
    }
}

/// Per-interface options, handed to the aggregator together with the
/// opened port.
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    pub name: String,
    /// Time-stamping interface when it differs from `name` (bonding).
    pub label: Option<String>,
    /// Unicast peer address for transports that need one.
    pub remote: Option<String>,
    /// Initial fault back-off exponent: faults clear after 2^k seconds.
    pub fault_reset_interval: i8,
    /// Index of the hardware clock serving this interface.
    pub hardware_clock: Option<u32>,
}

impl InterfaceConfig {
    pub fn new(name: &str) -> Self {
        InterfaceConfig {
            name: name.to_owned(),
            label: None,
            remote: None,
            fault_reset_interval: 4,
            hardware_clock: None,
        }
    }
}
