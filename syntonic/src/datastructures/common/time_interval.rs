use core::ops::{Deref, DerefMut};

use fixed::types::I48F16;

use crate::datastructures::{WireFormat, WireFormatError};
use crate::time::Tmv;

/// A time interval in nanoseconds, scaled by 2^16 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInterval(pub I48F16);

impl Deref for TimeInterval {
    type Target = I48F16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TimeInterval {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl WireFormat for TimeInterval {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 8 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.0.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 8 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self(I48F16::from_bits(i64::from_be_bytes(
            buffer[0..8].try_into().unwrap(),
        ))))
    }
}

impl From<Tmv> for TimeInterval {
    fn from(tmv: Tmv) -> Self {
        TimeInterval(I48F16::from_num(tmv.nanos()))
    }
}

impl TimeInterval {
    /// Whole nanoseconds, discarding the fractional part.
    pub fn to_tmv(self) -> Tmv {
        Tmv::from_nanos(self.0.to_bits() >> 16)
    }

    pub fn to_nanos(self) -> f64 {
        let bits = self.0.to_bits() as f64;
        bits / (1u32 << 16) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let representations = [
            (
                [0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x80, 0x00u8],
                TimeInterval(I48F16::from_num(2.5f64)),
            ),
            (
                [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00u8],
                TimeInterval(I48F16::from_num(-1.0f64)),
            ),
        ];

        for (bytes, object) in representations {
            let mut buffer = [0; 8];
            object.serialize(&mut buffer).unwrap();
            assert_eq!(buffer, bytes);

            assert_eq!(TimeInterval::deserialize(&bytes).unwrap(), object);
        }
    }

    #[test]
    fn tmv_round_trip() {
        let tmv = Tmv::from_nanos(-123_456);
        assert_eq!(TimeInterval::from(tmv).to_tmv(), tmv);
    }
}
