//! LDDS frame (header id + body)

use bytes::Bytes;

use super::server_error::{c_string, is_error_body};
use super::{FrameHeader, MessageId, ServerError};

/// LDDS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: MessageId,
    body: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(id: MessageId, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }

    /// Create a frame with an empty body
    #[must_use]
    pub fn empty(id: MessageId) -> Self {
        Self {
            id,
            body: Bytes::new(),
        }
    }

    /// Create a frame whose body is a fixed-width, NUL-padded name followed
    /// by free text. Names longer than `width` are truncated.
    #[must_use]
    pub fn with_name_header(id: MessageId, name: &str, width: usize, text: &[u8]) -> Self {
        let mut body = Vec::with_capacity(width + text.len());
        let name = name.as_bytes();
        let used = name.len().min(width);
        body.extend_from_slice(&name[..used]);
        body.resize(width, 0);
        body.extend_from_slice(text);
        Self::new(id, body)
    }

    /// Create from parsed header and body
    pub(crate) fn from_parts(header: FrameHeader, body: Bytes) -> Self {
        Self {
            id: header.id(),
            body,
        }
    }

    /// Get message id
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Get body
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the frame, returning the body
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Body as text up to the first NUL byte
    #[must_use]
    pub fn body_text(&self) -> String {
        c_string(&self.body)
    }

    /// Server error carried by this frame, if any
    #[must_use]
    pub fn server_error(&self) -> Option<ServerError> {
        is_error_body(&self.body).then(|| ServerError::parse(&self.body))
    }

    /// Header for this frame
    #[must_use]
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.id, self.body.len())
    }

    /// Encode to bytes
    pub fn encode(&self) -> super::Result<Vec<u8>> {
        super::encode(self)
    }

    /// Decode from bytes
    pub fn decode(bytes: impl Into<Bytes>) -> super::Result<Self> {
        super::decode(bytes.into())
    }
}
