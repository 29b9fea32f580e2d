//! Acquisition configuration

use std::time::Duration;

use tracing::warn;

use crate::config::{ConfigError, Properties};
use crate::protocol::DEFAULT_PORT;
use crate::session::{
    Credentials, NetworkList, SearchCriteria, SessionConfig, is_reference,
};

/// What to do when a message header cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BadMessagePolicy {
    /// Return the message undecoded
    #[default]
    Tolerate,
    /// Skip undecodable messages; close the session after this many in a row
    CloseAfter(u32),
}

impl BadMessagePolicy {
    /// Policy for a configured threshold; negative means tolerate
    #[must_use]
    pub fn from_threshold(threshold: i64) -> Self {
        if threshold < 0 {
            Self::Tolerate
        } else {
            Self::CloseAfter(u32::try_from(threshold).unwrap_or(u32::MAX).max(1))
        }
    }
}

/// Settings for one acquisition loop
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Server endpoint
    pub session: SessionConfig,
    /// Login credentials (references or literals)
    pub credentials: Credentials,
    /// Per-request wait
    pub timeout: Duration,
    /// Extra timeout periods before giving up on a quiet server
    pub retries: u32,
    /// Header failure handling
    pub bad_message_policy: BadMessagePolicy,
    /// Pick self-timed/random media by channel < 100 / >= 100
    pub legacy_ranges: bool,
    /// Upload device lists; when false they are referenced by name only
    pub send_netlists: bool,
    /// Deliver DAPS status messages
    pub allow_daps_status: bool,
    /// Return messages that match no platform
    pub allow_null_platform: bool,
    /// Message selection
    pub criteria: SearchCriteria,
    /// Device lists, uploaded (or referenced) before the criteria
    pub device_lists: Vec<NetworkList>,
    /// Sleep between requests while the server is caught up
    pub idle_pause: Duration,
    /// Refuse to reopen for this long after a failure
    pub timeout_sec_on_error: Duration,
    /// Name stamped on every message
    pub source_name: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            credentials: Credentials::anonymous(""),
            timeout: Duration::from_secs(60),
            retries: 0,
            bad_message_policy: BadMessagePolicy::Tolerate,
            legacy_ranges: false,
            send_netlists: true,
            allow_daps_status: false,
            allow_null_platform: false,
            criteria: SearchCriteria::default(),
            device_lists: Vec::new(),
            idle_pause: Duration::from_secs(1),
            timeout_sec_on_error: Duration::ZERO,
            source_name: String::new(),
        }
    }
}

impl AcquisitionConfig {
    /// Build from flat properties (keys are case-insensitive).
    ///
    /// | Key | Default |
    /// |-----|---------|
    /// | `host` / `hostname` | required |
    /// | `port` | 16003 |
    /// | `username` / `user` | required |
    /// | `password` | anonymous |
    /// | `lrgs.timeout` / `timeout` | 60 s |
    /// | `lrgs.retries` | 0 |
    /// | `lrgs.maxConsecutiveBadMessages` | -1 (tolerate) |
    /// | `OldChannelRanges` | false |
    /// | `sendnl` | true |
    /// | `allowDapsStatus` | false |
    /// | `allowNullPlatform` | false |
    /// | `netlist*` | list files to load |
    ///
    /// Selection keys are read by [`SearchCriteria::from_properties`].
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let host = props.require(&["host", "hostname"])?.trim().to_string();
        let port = props.parse_or(&["port"], DEFAULT_PORT)?;
        let user = props.require(&["username", "user"])?.trim().to_string();

        let credentials = match props.get(&["password"]).filter(|p| !p.trim().is_empty()) {
            Some(password) => {
                if !is_reference(password) {
                    warn!(
                        host = %host,
                        "password configured as a literal; use a ${{env.NAME}} or ${{file.PATH}} reference"
                    );
                }
                Credentials::new(user, password)
            }
            None => Credentials::anonymous(user),
        };

        let timeout_secs: u64 = props.parse_or(&["lrgs.timeout", "timeout"], 60)?;
        let threshold: i64 = props.parse_or(&["lrgs.maxConsecutiveBadMessages"], -1)?;
        let send_netlists = props.bool_or(&["sendnl"], true)?;

        let mut criteria = SearchCriteria::from_properties(props)?;
        let mut device_lists = Vec::new();
        let mut files: Vec<(&str, &str)> = props
            .with_prefix("netlist")
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        files.sort_unstable();
        for (key, file) in files {
            let file = file.trim();
            if send_netlists {
                let list = NetworkList::load(file).map_err(|err| {
                    ConfigError::invalid(&format!("netlist{key}"), file, err.to_string())
                })?;
                device_lists.push(list);
            } else {
                criteria.add_netlist(file);
            }
        }

        Ok(Self {
            session: SessionConfig {
                host: host.clone(),
                port,
                ..SessionConfig::default()
            },
            credentials,
            timeout: Duration::from_secs(timeout_secs),
            retries: props.parse_or(&["lrgs.retries"], 0)?,
            bad_message_policy: BadMessagePolicy::from_threshold(threshold),
            legacy_ranges: props.bool_or(&["OldChannelRanges"], false)?,
            send_netlists,
            allow_daps_status: props.bool_or(&["allowDapsStatus"], false)?,
            allow_null_platform: props.bool_or(&["allowNullPlatform"], false)?,
            criteria,
            device_lists,
            source_name: format!("{host}:{port}"),
            ..Self::default()
        })
    }

    /// Longest a single retrieve waits on a quiet server
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.timeout.saturating_mul(self.retries.saturating_add(1))
    }
}
