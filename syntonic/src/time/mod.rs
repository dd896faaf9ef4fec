//! The time scalar ([`Tmv`]) used throughout `syntonic`.
//!
//! PTP deals in three wire shapes of time: full timestamps (48-bit seconds
//! plus nanoseconds), correction fields (nanoseconds scaled by 2^16) and
//! `TimeInterval` values (the same scaling, signed). Internally everything
//! is folded into one signed nanosecond scalar so offset and delay
//! arithmetic stays exact.

mod tmv;

pub use tmv::Tmv;

/// Nanoseconds per second.
pub const NS_PER_SEC: i64 = 1_000_000_000;
