//! LDDS protocol error types

use thiserror::Error;

use super::{MessageId, ServerError};

/// LDDS protocol errors
#[derive(Error, Debug)]
pub enum Error {
    /// Frame did not start with the sync pattern
    #[error("invalid sync pattern: expected \"FAF0\", got {found:?}")]
    InvalidSync {
        /// Bytes found where the sync pattern was expected
        found: [u8; 4],
    },

    /// Unknown message id character
    #[error("invalid message id: {id_byte:#x}")]
    InvalidMessageId {
        /// Invalid id byte
        id_byte: u8,
    },

    /// Length field was not a 5-digit decimal number
    #[error("invalid length field {field:?}")]
    InvalidLength {
        /// Raw length field text
        field: String,
    },

    /// Body too large to encode
    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge {
        /// Body size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Server answered with a different message type
    #[error("unexpected response {got} - expected {expected}")]
    UnexpectedResponse {
        /// Expected response id
        expected: MessageId,
        /// Response id actually received
        got: MessageId,
    },

    /// Response could not be interpreted
    #[error("malformed response to {request}: {reason}")]
    MalformedResponse {
        /// Request being answered
        request: MessageId,
        /// What was wrong with it
        reason: String,
    },

    /// Read timed out after part of a frame had arrived
    #[error("read timed out {read} bytes into a frame")]
    PartialFrame {
        /// Frame bytes consumed before the timeout
        read: usize,
    },

    /// Server rejected the request
    #[error(transparent)]
    Server(#[from] ServerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is a socket read timeout between frames.
    ///
    /// A timeout inside a frame is [`Error::PartialFrame`] and does not
    /// count: the stream is out of step and cannot be reused.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
