//! The contract for the adjustable local clock.

use crate::time::Tmv;

#[derive(Debug, thiserror::Error)]
pub enum TimekeeperError {
    #[error("clock device error: {0}")]
    Io(#[from] std::io::Error),
    #[error("clock is not adjustable")]
    NotAdjustable,
}

/// An adjustable clock: the thing the aggregator disciplines.
///
/// Frequency is expressed as an offset in parts per billion from the
/// clock's nominal rate. Implementations exist for the system realtime
/// clock and for PTP hardware clock devices; a free-running aggregator
/// holds no timekeeper at all.
pub trait Timekeeper {
    /// Read the currently applied frequency offset.
    fn read_ppb(&self) -> Result<f64, TimekeeperError>;

    /// Replace the applied frequency offset.
    fn write_ppb(&mut self, ppb: f64) -> Result<(), TimekeeperError>;

    /// Jump the clock by a signed nanosecond delta.
    fn step(&mut self, nanos: i64) -> Result<(), TimekeeperError>;

    /// Read the current time of this clock.
    fn now(&self) -> Result<Tmv, TimekeeperError>;

    /// The largest frequency offset the clock accepts, in ppb.
    fn max_ppb(&self) -> f64;
}
