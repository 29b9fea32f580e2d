//! LDDS frame header
//!
//! The header is 10 ASCII bytes.

use super::{HEADER_SIZE, MAX_BODY_SIZE, MessageId, SYNC};

/// LDDS frame header (10 bytes)
///
/// # Wire Format
///
/// ```text
/// 0       4    5               10
/// +-------+----+----------------+
/// | FAF0  | id | length (5 dec) |
/// +-------+----+----------------+
/// ```
///
/// The length is zero-padded decimal ASCII and counts body bytes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    id: MessageId,
    body_len: usize,
}

impl FrameHeader {
    /// Create a new frame header
    #[must_use]
    pub const fn new(id: MessageId, body_len: usize) -> Self {
        Self { id, body_len }
    }

    /// Get message id
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Get body length
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.body_len
    }

    /// Validate header
    pub fn validate(&self) -> super::Result<()> {
        if self.body_len > MAX_BODY_SIZE {
            return Err(super::Error::BodyTooLarge {
                size: self.body_len,
                max: MAX_BODY_SIZE,
            });
        }
        Ok(())
    }

    /// Convert to bytes
    pub fn to_bytes(&self) -> super::Result<[u8; HEADER_SIZE]> {
        self.validate()?;

        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(SYNC);
        bytes[4] = self.id.as_u8();
        let len = format!("{:05}", self.body_len);
        bytes[5..10].copy_from_slice(len.as_bytes());
        Ok(bytes)
    }

    /// Parse from bytes
    pub fn from_bytes(bytes: &[u8]) -> super::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(super::Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        if &bytes[0..4] != SYNC {
            let mut found = [0u8; 4];
            found.copy_from_slice(&bytes[0..4]);
            return Err(super::Error::InvalidSync { found });
        }

        let id = MessageId::from_u8(bytes[4])
            .ok_or(super::Error::InvalidMessageId { id_byte: bytes[4] })?;

        let field = &bytes[5..10];
        // Legacy servers pad the length with spaces instead of zeros.
        let text = String::from_utf8_lossy(field);
        let body_len = text
            .trim()
            .parse::<usize>()
            .map_err(|_| super::Error::InvalidLength {
                field: text.to_string(),
            })?;

        let header = Self { id, body_len };
        header.validate()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::new(MessageId::Dcp, 123);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes, b"FAF0f00123");
    }

    #[test]
    fn test_header_parse() {
        let decoded = FrameHeader::from_bytes(b"FAF0m00042").unwrap();
        assert_eq!(decoded.id(), MessageId::AuthHello);
        assert_eq!(decoded.body_len(), 42);
    }

    #[test]
    fn test_space_padded_length() {
        let decoded = FrameHeader::from_bytes(b"FAF0e    0").unwrap();
        assert_eq!(decoded.id(), MessageId::Stop);
        assert_eq!(decoded.body_len(), 0);
    }

    #[test]
    fn test_invalid_sync() {
        let result = FrameHeader::from_bytes(b"DEADf00010");
        assert!(matches!(result, Err(super::super::Error::InvalidSync { .. })));
    }

    #[test]
    fn test_invalid_length() {
        let result = FrameHeader::from_bytes(b"FAF0f0x010");
        assert!(matches!(
            result,
            Err(super::super::Error::InvalidLength { .. })
        ));
    }
}
