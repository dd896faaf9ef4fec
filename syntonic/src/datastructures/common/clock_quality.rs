use crate::datastructures::{WireFormat, WireFormatError};

/// A description of the accuracy and type of a clock.
///
/// The `clock_accuracy` field carries the raw code points of
/// *IEEE1588-2019 table 5*; the dataset comparison orders them
/// numerically, which is all the aggregator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockQuality {
    /// The PTP clock class.
    pub clock_class: u8,
    /// The accuracy code point of the clock (0xfe when unknown).
    pub clock_accuracy: u8,
    /// 2-log of the variance (in seconds^2) of the clock when not
    /// synchronized.
    pub offset_scaled_log_variance: u16,
}

impl Default for ClockQuality {
    fn default() -> Self {
        Self {
            clock_class: 248,
            clock_accuracy: 0xfe,
            offset_scaled_log_variance: 0xffff,
        }
    }
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = self.clock_class;
        buffer[1] = self.clock_accuracy;
        buffer[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            clock_class: buffer[0],
            clock_accuracy: buffer[1],
            offset_scaled_log_variance: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let quality = ClockQuality {
            clock_class: 6,
            clock_accuracy: 0x21,
            offset_scaled_log_variance: 0x1234,
        };

        let mut buffer = [0; 4];
        quality.serialize(&mut buffer).unwrap();
        assert_eq!(buffer, [6, 0x21, 0x12, 0x34]);

        assert_eq!(ClockQuality::deserialize(&buffer).unwrap(), quality);
    }
}
