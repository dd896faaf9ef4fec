use crate::datastructures::{WireFormat, WireFormatError};

/// A length-prefixed text field, at most 255 bytes of UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PtpText(String);

impl PtpText {
    /// Build from a string, truncating to the 255 byte wire limit on a
    /// character boundary.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(255);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        PtpText(text[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl WireFormat for PtpText {
    fn wire_size(&self) -> usize {
        1 + self.0.len()
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = self.0.len() as u8;
        buffer[1..1 + self.0.len()].copy_from_slice(self.0.as_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let len = *buffer.first().ok_or(WireFormatError::BufferTooShort)? as usize;
        let text = buffer.get(1..1 + len).ok_or(WireFormatError::BufferTooShort)?;
        let text = core::str::from_utf8(text).map_err(|_| WireFormatError::Invalid)?;
        Ok(PtpText(text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let text = PtpText::new("syntonic");

        let mut buffer = [0; 9];
        text.serialize(&mut buffer).unwrap();
        assert_eq!(&buffer[..2], &[8, b's']);

        assert_eq!(PtpText::deserialize(&buffer).unwrap(), text);
    }

    #[test]
    fn truncates_on_char_boundary() {
        let text = PtpText::new(&"é".repeat(200));
        assert!(text.wire_size() <= 256);
        assert!(text.as_str().chars().all(|c| c == 'é'));
    }
}
