//! Common data structures that are used throughout the protocol

mod clock_identity;
mod clock_quality;
mod port_identity;
mod ptp_text;
mod time_flags;
mod time_interval;
mod time_source;
mod wire_timestamp;

pub use clock_identity::*;
pub use clock_quality::*;
pub use port_identity::*;
pub use ptp_text::*;
pub use time_flags::*;
pub use time_interval::*;
pub use time_source::*;
pub use wire_timestamp::*;
