//! Ptp network messages.
//!
//! Only the management message is modelled in full: the aggregator routes,
//! polices and answers management traffic itself, and the local management
//! endpoint carries exactly the network framing. Event messages (announce,
//! sync, ...) are parsed by the ports and reach the aggregator as already
//! digested samples.

mod header;
mod management;
mod management_id;

pub use header::*;
pub use management::*;
pub use management_id::*;

/// Maximum length of a packet.
pub const MAX_DATA_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xa,
    Announce = 0xb,
    Signaling = 0xc,
    Management = 0xd,
}

impl TryFrom<u8> for MessageType {
    type Error = super::WireFormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;

        match value {
            0x0 => Ok(Sync),
            0x1 => Ok(DelayReq),
            0x2 => Ok(PDelayReq),
            0x3 => Ok(PDelayResp),
            0x8 => Ok(FollowUp),
            0x9 => Ok(DelayResp),
            0xa => Ok(PDelayRespFollowUp),
            0xb => Ok(Announce),
            0xc => Ok(Signaling),
            0xd => Ok(Management),
            _ => Err(super::WireFormatError::EnumConversionError),
        }
    }
}
