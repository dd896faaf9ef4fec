//! The clock servo contract and the default proportional-integral
//! realization.
//!
//! A servo turns a stream of measured master offsets into frequency
//! corrections for the timekeeper. The aggregator only depends on the
//! [`Servo`] trait; [`PiServo`] is the variant shipped here, the others
//! remain tags for platform layers to supply.

mod pi;

pub use pi::PiServo;

use crate::time::Tmv;

/// What the servo wants the aggregator to do with the current sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServoState {
    /// Not enough history to act; leave the clock alone.
    Unlocked,
    /// The offset is too large to slew; step the clock, then apply the
    /// returned frequency.
    Jump,
    /// Tracking; apply the returned frequency only.
    Locked,
}

impl ServoState {
    /// The numeric tag used in the per-sample log line.
    pub const fn as_int(self) -> i32 {
        match self {
            ServoState::Unlocked => 0,
            ServoState::Jump => 1,
            ServoState::Locked => 2,
        }
    }
}

impl core::fmt::Display for ServoState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.as_int().fmt(f)
    }
}

/// Selects which servo variant a platform layer instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ServoKind {
    #[default]
    Pi,
    LinReg,
    NullF,
}

/// A stateful controller mapping master offsets to frequency corrections.
pub trait Servo {
    /// Feed one measurement: the offset to the master in nanoseconds and
    /// the local time the measurement was taken. Returns the estimated
    /// local frequency error in parts per billion together with the
    /// actuation the aggregator should perform.
    fn sample(&mut self, offset: Tmv, local_ts: Tmv) -> (f64, ServoState);
}
