//! Retrieval outcomes other than a message

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why the message stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Server reached the until time of the search criteria
    UntilReached,
    /// The cancel token was triggered
    Aborted,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntilReached => f.write_str("until time reached"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// No platform in the directory matches a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "no platform matching '{address}'{} and medium type {medium_type} near '{fragment}'",
    .channel.map(|c| format!(" and channel {c}")).unwrap_or_default()
)]
pub struct UnknownPlatform {
    /// Medium id the lookup used
    pub address: String,
    /// GOES channel, when the message carries one
    pub channel: Option<u32>,
    /// Medium type the lookup used
    pub medium_type: String,
    /// Leading bytes of the message
    pub fragment: String,
}

/// Result of [`AcquisitionLoop::retrieve`](super::AcquisitionLoop::retrieve)
/// when no message is returned
#[derive(Error, Debug)]
pub enum RetrieveError {
    /// Nothing arrived before the retry deadline; the session stays open
    #[error("no message received within {waited:?}")]
    Blocked {
        /// Time spent waiting
        waited: Duration,
    },

    /// The stream ended normally
    #[error("message stream ended: {0}")]
    Ended(EndReason),

    /// The session is unusable; reopen before retrieving again.
    ///
    /// A tripped bad-message breaker lands here with the last
    /// [`ParseFailure`](crate::header::ParseFailure) as the source.
    #[error("{reason}")]
    Fatal {
        /// What happened
        reason: String,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A message could not be bound to a platform
    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatform),
}

impl RetrieveError {
    pub(crate) fn fatal(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fatal {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if the session was torn down by this outcome
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
