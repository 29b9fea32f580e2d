//! Session state machine

use std::fmt;

/// Session lifecycle
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Authenticated -> Streaming
///       ^                                                        |
///       +------------------------ close() -----------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No socket
    #[default]
    Disconnected,
    /// TCP connect in progress
    Connecting,
    /// Socket open, not logged in
    Connected,
    /// Logged in; selection may be sent
    Authenticated,
    /// Messages are being requested
    Streaming,
}

impl SessionState {
    /// Check if a socket is held in this state
    #[must_use]
    pub const fn has_socket(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated | Self::Streaming)
    }

    /// Check if the session has logged in
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}
