use super::{Header, ManagementErrorId, ManagementId, MessageType};
use crate::datastructures::common::PortIdentity;
use crate::datastructures::{WireFormat, WireFormatError};

/// Actions a management message can request, *IEEE1588-2019 table 57*.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagementAction {
    Get,
    Set,
    Response,
    Command,
    Acknowledge,
    Unknown(u8),
}

impl ManagementAction {
    pub fn to_primitive(self) -> u8 {
        match self {
            Self::Get => 0,
            Self::Set => 1,
            Self::Response => 2,
            Self::Command => 3,
            Self::Acknowledge => 4,
            Self::Unknown(v) => v,
        }
    }

    pub fn from_primitive(value: u8) -> Self {
        match value {
            0 => Self::Get,
            1 => Self::Set,
            2 => Self::Response,
            3 => Self::Command,
            4 => Self::Acknowledge,
            v => Self::Unknown(v),
        }
    }
}

/// A raw TLV as carried in the suffix of a management message.
///
/// For `MANAGEMENT` TLVs the value starts with the two managementId
/// bytes; the remainder is the data field. The length field on the wire
/// equals the value length, so a GET/COMMAND TLV with an empty data field
/// has length 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: u16,
    pub value: Vec<u8>,
}

impl Tlv {
    pub const MANAGEMENT: u16 = 0x0001;
    pub const MANAGEMENT_ERROR_STATUS: u16 = 0x0002;

    /// Build a management TLV from an id and data field.
    pub fn management(id: ManagementId, data: &[u8]) -> Self {
        let mut value = Vec::with_capacity(2 + data.len());
        value.extend_from_slice(&id.to_primitive().to_be_bytes());
        value.extend_from_slice(data);
        Tlv {
            tlv_type: Self::MANAGEMENT,
            value,
        }
    }

    /// Build a management error status TLV for the given id.
    pub fn management_error(error: ManagementErrorId, id: ManagementId) -> Self {
        let mut value = vec![0; 8];
        value[0..2].copy_from_slice(&error.to_primitive().to_be_bytes());
        value[2..4].copy_from_slice(&id.to_primitive().to_be_bytes());
        Tlv {
            tlv_type: Self::MANAGEMENT_ERROR_STATUS,
            value,
        }
    }

    /// The management id, when this is a management or management error
    /// status TLV with a complete id field.
    pub fn management_id(&self) -> Option<ManagementId> {
        let raw = match self.tlv_type {
            Self::MANAGEMENT => self.value.get(0..2)?,
            Self::MANAGEMENT_ERROR_STATUS => self.value.get(2..4)?,
            _ => return None,
        };
        Some(ManagementId::from_primitive(u16::from_be_bytes(
            raw.try_into().unwrap(),
        )))
    }

    /// The error code of a management error status TLV.
    pub fn management_error_id(&self) -> Option<ManagementErrorId> {
        if self.tlv_type != Self::MANAGEMENT_ERROR_STATUS {
            return None;
        }
        let raw = self.value.get(0..2)?;
        Some(ManagementErrorId::from_primitive(u16::from_be_bytes(
            raw.try_into().unwrap(),
        )))
    }

    /// The data field of a management TLV (everything after the id).
    pub fn management_data(&self) -> &[u8] {
        self.value.get(2..).unwrap_or(&[])
    }

    pub fn wire_size(&self) -> usize {
        4 + self.value.len()
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&self.tlv_type.to_be_bytes());
        buffer[2..4].copy_from_slice(&(self.value.len() as u16).to_be_bytes());
        buffer[4..4 + self.value.len()].copy_from_slice(&self.value);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        let tlv_type = u16::from_be_bytes(buffer[0..2].try_into().unwrap());
        let length = u16::from_be_bytes(buffer[2..4].try_into().unwrap()) as usize;
        let value = buffer
            .get(4..4 + length)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(Tlv {
            tlv_type,
            value: value.to_vec(),
        })
    }
}

/// A complete management message: common header, management fields and
/// the TLV suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementMsg {
    pub header: Header,
    pub target_port_identity: PortIdentity,
    pub starting_boundary_hops: u8,
    pub boundary_hops: u8,
    pub action: ManagementAction,
    pub tlvs: Vec<Tlv>,
}

/// Size of the header plus the fixed management fields.
const MANAGEMENT_HEADER_LEN: usize = 48;

impl ManagementMsg {
    pub fn new(domain_number: u8, action: ManagementAction) -> Self {
        ManagementMsg {
            header: Header::new(MessageType::Management, domain_number),
            target_port_identity: PortIdentity {
                clock_identity: crate::datastructures::common::ClockIdentity::WILDCARD,
                port_number: 0xffff,
            },
            starting_boundary_hops: 0,
            boundary_hops: 0,
            action,
            tlvs: Vec::new(),
        }
    }

    /// The single TLV of a well-formed request.
    pub fn tlv(&self) -> Option<&Tlv> {
        self.tlvs.first()
    }

    /// Serialize the full frame, computing the header length field.
    pub fn serialize_vec(&self) -> Result<Vec<u8>, WireFormatError> {
        let total = MANAGEMENT_HEADER_LEN + self.tlvs.iter().map(Tlv::wire_size).sum::<usize>();
        let mut buffer = vec![0; total];

        let mut header = self.header;
        header.message_length = total as u16;
        header.serialize(&mut buffer[0..34])?;

        self.target_port_identity.serialize(&mut buffer[34..44])?;
        buffer[44] = self.starting_boundary_hops;
        buffer[45] = self.boundary_hops;
        buffer[46] = self.action.to_primitive() & 0x0f;
        buffer[47] = 0;

        let mut offset = MANAGEMENT_HEADER_LEN;
        for tlv in &self.tlvs {
            tlv.serialize(&mut buffer[offset..])?;
            offset += tlv.wire_size();
        }

        Ok(buffer)
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header = Header::deserialize(buffer)?;
        if header.message_type != MessageType::Management {
            return Err(WireFormatError::Invalid);
        }
        if buffer.len() < MANAGEMENT_HEADER_LEN {
            return Err(WireFormatError::BufferTooShort);
        }
        let message_length = (header.message_length as usize).min(buffer.len());

        let mut tlvs = Vec::new();
        let mut offset = MANAGEMENT_HEADER_LEN;
        while offset + 4 <= message_length {
            let tlv = Tlv::deserialize(&buffer[offset..message_length])?;
            offset += tlv.wire_size();
            tlvs.push(tlv);
        }

        Ok(Self {
            header,
            target_port_identity: PortIdentity::deserialize(&buffer[34..44])?,
            starting_boundary_hops: buffer[44],
            boundary_hops: buffer[45],
            action: ManagementAction::from_primitive(buffer[46] & 0x0f),
            tlvs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn request(action: ManagementAction, tlv: Tlv) -> ManagementMsg {
        let mut msg = ManagementMsg::new(0, action);
        msg.header.source_port_identity = PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: 1,
        };
        msg.header.sequence_id = 7;
        msg.starting_boundary_hops = 3;
        msg.boundary_hops = 3;
        msg.tlvs.push(tlv);
        msg
    }

    #[test]
    fn frame_round_trip() {
        let msg = request(
            ManagementAction::Get,
            Tlv::management(ManagementId::DefaultDataSet, &[]),
        );

        let frame = msg.serialize_vec().unwrap();
        assert_eq!(frame.len(), 48 + 4 + 2);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]) as usize, frame.len());

        let parsed = ManagementMsg::deserialize(&frame).unwrap();
        assert_eq!(parsed.action, ManagementAction::Get);
        assert_eq!(parsed.boundary_hops, 3);
        assert_eq!(parsed.tlvs.len(), 1);
        assert_eq!(
            parsed.tlv().unwrap().management_id(),
            Some(ManagementId::DefaultDataSet)
        );
        assert!(parsed.tlv().unwrap().management_data().is_empty());
    }

    #[test]
    fn error_tlv_layout() {
        let tlv = Tlv::management_error(
            ManagementErrorId::NotSupported,
            ManagementId::Priority1,
        );
        assert_eq!(tlv.value.len(), 8);
        assert_eq!(tlv.management_error_id(), Some(ManagementErrorId::NotSupported));
        assert_eq!(tlv.management_id(), Some(ManagementId::Priority1));
    }

    #[test]
    fn rejects_non_management_frames() {
        let mut frame = request(
            ManagementAction::Get,
            Tlv::management(ManagementId::NullManagement, &[]),
        )
        .serialize_vec()
        .unwrap();
        frame[0] = 0x0b; // announce
        assert!(ManagementMsg::deserialize(&frame).is_err());
    }
}
