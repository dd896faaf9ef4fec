use arrayvec::ArrayVec;

use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};
use crate::datastructures::{WireFormat, WireFormatError};

/// Upper bound on the number of clock identities retained in the path
/// trace list.
pub const PATH_TRACE_MAX: usize = 8;

/// Who this clock takes its time from, and the attributes of the
/// grandmaster at the root of that chain.
///
/// When the clock is its own grandmaster the parent fields all describe
/// the local clock. The parent-statistics fields are never computed here
/// and stay at their "not observed" sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentDS {
    pub parent_port_identity: PortIdentity,
    pub parent_stats: bool,
    pub observed_parent_offset_scaled_log_variance: u16,
    pub observed_parent_clock_phase_change_rate: u32,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority1: u8,
    pub grandmaster_priority2: u8,
    pub path_trace: ArrayVec<ClockIdentity, PATH_TRACE_MAX>,
}

impl ParentDS {
    /// A parent dataset describing the given local clock as its own
    /// grandmaster.
    pub fn new(
        clock_identity: ClockIdentity,
        clock_quality: ClockQuality,
        priority1: u8,
        priority2: u8,
    ) -> Self {
        ParentDS {
            parent_port_identity: PortIdentity {
                clock_identity,
                port_number: 0,
            },
            parent_stats: false,
            observed_parent_offset_scaled_log_variance: 0xffff,
            observed_parent_clock_phase_change_rate: 0x7fff_ffff,
            grandmaster_identity: clock_identity,
            grandmaster_clock_quality: clock_quality,
            grandmaster_priority1: priority1,
            grandmaster_priority2: priority2,
            path_trace: ArrayVec::new(),
        }
    }
}

impl WireFormat for ParentDS {
    fn wire_size(&self) -> usize {
        32
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 32 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.parent_port_identity.serialize(&mut buffer[0..10])?;
        buffer[10] = self.parent_stats as u8;
        buffer[11] = 0;
        buffer[12..14]
            .copy_from_slice(&self.observed_parent_offset_scaled_log_variance.to_be_bytes());
        buffer[14..18].copy_from_slice(&self.observed_parent_clock_phase_change_rate.to_be_bytes());
        buffer[18] = self.grandmaster_priority1;
        self.grandmaster_clock_quality.serialize(&mut buffer[19..23])?;
        buffer[23] = self.grandmaster_priority2;
        self.grandmaster_identity.serialize(&mut buffer[24..32])?;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 32 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            parent_port_identity: PortIdentity::deserialize(&buffer[0..10])?,
            parent_stats: buffer[10] != 0,
            observed_parent_offset_scaled_log_variance: u16::from_be_bytes(
                buffer[12..14].try_into().unwrap(),
            ),
            observed_parent_clock_phase_change_rate: u32::from_be_bytes(
                buffer[14..18].try_into().unwrap(),
            ),
            grandmaster_priority1: buffer[18],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[19..23])?,
            grandmaster_priority2: buffer[23],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[24..32])?,
            path_trace: ArrayVec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_points_at_self() {
        let identity = ClockIdentity([9; 8]);
        let dad = ParentDS::new(identity, ClockQuality::default(), 128, 128);

        assert_eq!(dad.grandmaster_identity, identity);
        assert_eq!(dad.parent_port_identity.port_number, 0);
        assert_eq!(dad.observed_parent_offset_scaled_log_variance, 0xffff);
        assert_eq!(dad.observed_parent_clock_phase_change_rate, 0x7fff_ffff);
        assert!(dad.path_trace.is_empty());
    }

    #[test]
    fn wireformat() {
        let dad = ParentDS::new(ClockIdentity([1; 8]), ClockQuality::default(), 1, 2);

        let mut buffer = [0; 32];
        dad.serialize(&mut buffer).unwrap();

        assert_eq!(ParentDS::deserialize(&buffer).unwrap(), dad);
    }
}
