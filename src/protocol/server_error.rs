//! Server-side error responses
//!
//! A response body starting with `?` carries `?<derrno>,<errno>,<text>`.

use std::fmt;

/// LRGS server error codes (`derrno`)
pub mod code {
    /// Success
    pub const DSUCCESS: i32 = 0;
    /// Invalid since time in search criteria
    pub const DBADSINCE: i32 = 5;
    /// Invalid until time in search criteria
    pub const DBADUNTIL: i32 = 6;
    /// Invalid network list
    pub const DBADNLIST: i32 = 7;
    /// Invalid DCP address
    pub const DBADADDR: i32 = 8;
    /// No message arrived within the server-side wait; client is caught up
    pub const DMSGTIMEOUT: i32 = 11;
    /// Search criteria could not be parsed
    pub const DBADSEARCHCRIT: i32 = 17;
    /// Authentication failed
    pub const DDDSAUTHFAILED: i32 = 22;
    /// Internal server error
    pub const DDDSINTERNAL: i32 = 23;
    /// Specified until time reached
    pub const DUNTIL: i32 = 25;
    /// Until time reached in DRS (retransmit) mode
    pub const DUNTILDRS: i32 = 26;
    /// Strong authentication required
    pub const DSTRONGREQUIRED: i32 = 38;
}

/// Error response returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// LRGS error code
    pub derrno: i32,
    /// System errno reported by the server, if any
    pub errno: i32,
    /// Human-readable text
    pub message: String,
}

impl ServerError {
    /// Parse a `?derrno,errno,text` response body.
    ///
    /// Bodies that do not carry numeric codes keep the whole text with both
    /// codes set to zero.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let text = c_string(body);
        let text = text.strip_prefix('?').unwrap_or(&text);

        let mut parts = text.splitn(3, ',');
        let derrno = parts.next().and_then(|s| s.trim().parse::<i32>().ok());
        let errno = parts.next().and_then(|s| s.trim().parse::<i32>().ok());
        match (derrno, errno) {
            (Some(derrno), Some(errno)) => Self {
                derrno,
                errno,
                message: parts.next().unwrap_or("").trim().to_string(),
            },
            _ => Self {
                derrno: code::DSUCCESS,
                errno: 0,
                message: text.trim().to_string(),
            },
        }
    }

    /// Server has no new data yet
    #[must_use]
    pub fn is_caught_up(&self) -> bool {
        self.derrno == code::DMSGTIMEOUT
    }

    /// Server reached the until time of the search criteria
    #[must_use]
    pub fn is_until_reached(&self) -> bool {
        matches!(self.derrno, code::DUNTIL | code::DUNTILDRS)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "server error (derrno={}, errno={}): {}",
            self.derrno, self.errno, self.message
        )
    }
}

impl std::error::Error for ServerError {}

/// Check if a response body is an error response
#[must_use]
pub fn is_error_body(body: &[u8]) -> bool {
    body.first() == Some(&b'?')
}

/// Text up to the first NUL byte
#[must_use]
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
