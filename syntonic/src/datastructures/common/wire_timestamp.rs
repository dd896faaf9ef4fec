use crate::datastructures::{WireFormat, WireFormatError};
use crate::time::{Tmv, NS_PER_SEC};

/// A PTP timestamp as it appears on the wire: 48 bits of seconds since the
/// PTP epoch plus a nanosecond field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct WireTimestamp {
    /// The seconds field of the timestamp. 48-bit, must fit.
    pub seconds: u64,
    /// The nanoseconds field of the timestamp. Must be less than 10^9.
    pub nanos: u32,
}

impl WireTimestamp {
    pub fn to_tmv(self) -> Tmv {
        Tmv::from_sec_nsec(self.seconds as i64, self.nanos)
    }

    pub fn from_tmv(tmv: Tmv) -> Self {
        let ns = tmv.nanos();
        WireTimestamp {
            seconds: (ns / NS_PER_SEC) as u64,
            nanos: (ns % NS_PER_SEC) as u32,
        }
    }
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        let mut seconds = [0; 8];
        seconds[2..8].copy_from_slice(&buffer[0..6]);
        Ok(Self {
            seconds: u64::from_be_bytes(seconds),
            nanos: u32::from_be_bytes(buffer[6..10].try_into().unwrap()),
        })
    }
}
