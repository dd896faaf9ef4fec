use crate::datastructures::common::{TimeFlags, TimeSource};
use crate::datastructures::{WireFormat, WireFormatError};

/// The timescale properties currently in effect, either taken from the
/// elected grandmaster's announce messages or describing the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimePropertiesDS {
    /// TAI minus UTC, in seconds.
    pub current_utc_offset: i16,
    pub flags: TimeFlags,
    pub time_source: TimeSource,
}

impl WireFormat for TimePropertiesDS {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[2] = self.flags.raw();
        buffer[3] = self.time_source.to_primitive();
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            current_utc_offset: i16::from_be_bytes(buffer[0..2].try_into().unwrap()),
            flags: TimeFlags::from_raw(buffer[2]),
            time_source: TimeSource::from_primitive(buffer[3]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let tds = TimePropertiesDS {
            current_utc_offset: 37,
            flags: TimeFlags::PTP_TIMESCALE | TimeFlags::UTC_OFF_VALID,
            time_source: TimeSource::Gnss,
        };

        let mut buffer = [0; 4];
        tds.serialize(&mut buffer).unwrap();
        assert_eq!(buffer, [0, 37, 0x0c, 0x20]);

        assert_eq!(TimePropertiesDS::deserialize(&buffer).unwrap(), tds);
    }
}
