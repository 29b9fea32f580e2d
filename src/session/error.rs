//! Session-level error types

use std::time::Duration;

use thiserror::Error;

use super::SessionState;
use crate::protocol::{self, ServerError};

/// The relay server could not be reached or refused the login.
///
/// Fatal for this attempt; the caller may back off and retry.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// TCP connect failed or timed out
    #[error("cannot connect to {host}:{port}: {source}")]
    Unreachable {
        /// Server host
        host: String,
        /// Server port
        port: u16,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Host name did not resolve
    #[error("cannot resolve {host}:{port}")]
    Resolve {
        /// Server host
        host: String,
        /// Server port
        port: u16,
    },

    /// Server rejected the hello
    #[error("authentication rejected for user '{user}': {source}")]
    Authentication {
        /// User name presented
        user: String,
        /// Server response
        #[source]
        source: ServerError,
    },

    /// Credential reference could not be resolved
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Handshake failed at the protocol level
    #[error("handshake failed: {0}")]
    Handshake(#[from] protocol::Error),

    /// Selection state was rejected while (re)opening the session
    #[error("selection rejected: {0}")]
    Selection(#[from] SessionError),

    /// A recent failure is still cooling off
    #[error("last failure was {elapsed:?} ago; refusing to reconnect for {remaining:?}")]
    CoolingOff {
        /// Time since the last failure
        elapsed: Duration,
        /// Time left before a reconnect is allowed
        remaining: Duration,
    },

    /// Operation not allowed in the current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// Current state
        state: SessionState,
    },
}

/// The server rejected a request or the protocol was violated.
///
/// The session is closed before this is returned; a reconnect is required.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Server error response
    #[error("{request} rejected: {source}")]
    Server {
        /// Request that was rejected
        request: &'static str,
        /// Server response
        #[source]
        source: ServerError,
    },

    /// Malformed or unexpected frame
    #[error(transparent)]
    Protocol(#[from] protocol::Error),

    /// Operation not allowed in the current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// Current state
        state: SessionState,
    },
}

/// A credential reference could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Referenced variable is not set
    #[error("credential reference '{reference}' is not set")]
    Unset {
        /// The reference as configured
        reference: String,
    },

    /// Referenced secrets file could not be read
    #[error("cannot read credential file '{path}': {reason}")]
    File {
        /// File path
        path: String,
        /// Why it failed
        reason: String,
    },

    /// Reference syntax is invalid
    #[error("malformed credential reference '{reference}'")]
    Malformed {
        /// The reference as configured
        reference: String,
    },

    /// User name resolved to nothing
    #[error("username cannot be blank")]
    BlankUser,
}
