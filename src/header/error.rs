//! Header parse failures

use thiserror::Error;

/// Number of raw bytes quoted in a failure
pub const FRAGMENT_LEN: usize = 20;

/// A header could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{reason} near '{fragment}'{}",
    .setting.as_ref().map(|s| format!(" (setting {s})")).unwrap_or_default()
)]
pub struct ParseFailure {
    /// What went wrong
    pub reason: String,
    /// Leading bytes of the offending text
    pub fragment: String,
    /// Configuration value that was violated, if any
    pub setting: Option<String>,
}

impl ParseFailure {
    /// Create a failure quoting the start of `data`
    pub fn new(reason: impl Into<String>, data: &[u8]) -> Self {
        Self {
            reason: reason.into(),
            fragment: fragment(data),
            setting: None,
        }
    }

    /// Attach the violated configuration value
    #[must_use]
    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = Some(setting.into());
        self
    }
}

/// First [`FRAGMENT_LEN`] bytes as lossy text
#[must_use]
pub fn fragment(data: &[u8]) -> String {
    let end = data.len().min(FRAGMENT_LEN);
    String::from_utf8_lossy(&data[..end]).into_owned()
}
