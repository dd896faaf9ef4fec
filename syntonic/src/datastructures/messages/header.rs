use super::MessageType;
use crate::datastructures::common::PortIdentity;
use crate::datastructures::{WireFormat, WireFormatError};

/// The 34-byte common header at the front of every PTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: MessageType,
    pub version: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: [u8; 2],
    pub correction_field: i64,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control_field: u8,
    pub log_message_interval: i8,
}

impl Header {
    pub fn new(message_type: MessageType, domain_number: u8) -> Self {
        Header {
            message_type,
            version: 2,
            message_length: 0,
            domain_number,
            flags: [0, 0],
            correction_field: 0,
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            control_field: 0,
            log_message_interval: 0x7f,
        }
    }
}

impl WireFormat for Header {
    fn wire_size(&self) -> usize {
        34
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 34 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = self.message_type as u8;
        buffer[1] = self.version;
        buffer[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = 0;
        buffer[6..8].copy_from_slice(&self.flags);
        buffer[8..16].copy_from_slice(&self.correction_field.to_be_bytes());
        buffer[16..20].fill(0);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = self.control_field;
        buffer[33] = self.log_message_interval as u8;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 34 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            message_type: MessageType::try_from(buffer[0] & 0x0f)?,
            version: buffer[1] & 0x0f,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
            domain_number: buffer[4],
            flags: [buffer[6], buffer[7]],
            correction_field: i64::from_be_bytes(buffer[8..16].try_into().unwrap()),
            source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
            sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
            control_field: buffer[32],
            log_message_interval: buffer[33] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn wireformat() {
        let mut header = Header::new(MessageType::Management, 3);
        header.source_port_identity = PortIdentity {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            port_number: 1,
        };
        header.sequence_id = 0x1234;
        header.message_length = 48;

        let mut buffer = [0; 34];
        header.serialize(&mut buffer).unwrap();
        assert_eq!(buffer[0], 0x0d);
        assert_eq!(buffer[1], 2);
        assert_eq!(&buffer[2..4], &[0, 48]);

        assert_eq!(Header::deserialize(&buffer).unwrap(), header);
    }
}
