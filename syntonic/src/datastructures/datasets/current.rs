use crate::datastructures::common::TimeInterval;
use crate::datastructures::{WireFormat, WireFormatError};

/// The running synchronization summary of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentDS {
    /// Number of hops between this clock and the grandmaster; zero when
    /// this clock is the grandmaster.
    pub steps_removed: u16,
    pub offset_from_master: TimeInterval,
    pub mean_path_delay: TimeInterval,
}

impl WireFormat for CurrentDS {
    fn wire_size(&self) -> usize {
        18
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 18 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&self.steps_removed.to_be_bytes());
        self.offset_from_master.serialize(&mut buffer[2..10])?;
        self.mean_path_delay.serialize(&mut buffer[10..18])?;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 18 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            steps_removed: u16::from_be_bytes(buffer[0..2].try_into().unwrap()),
            offset_from_master: TimeInterval::deserialize(&buffer[2..10])?,
            mean_path_delay: TimeInterval::deserialize(&buffer[10..18])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Tmv;

    #[test]
    fn wireformat() {
        let cur = CurrentDS {
            steps_removed: 2,
            offset_from_master: TimeInterval::from(Tmv::from_nanos(1000)),
            mean_path_delay: TimeInterval::from(Tmv::from_nanos(-5)),
        };

        let mut buffer = [0; 18];
        cur.serialize(&mut buffer).unwrap();

        assert_eq!(CurrentDS::deserialize(&buffer).unwrap(), cur);
    }
}
