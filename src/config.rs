//! Flat property maps and configuration errors

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required key absent
    #[error("missing required property '{key}'")]
    Missing {
        /// Property name
        key: String,
    },

    /// Value could not be interpreted
    #[error("invalid value '{value}' for property '{key}': {reason}")]
    Invalid {
        /// Property name
        key: String,
        /// Offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// String properties with case-insensitive keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, (String, String)>,
}

impl Properties {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing any key that differs only in case
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.entries
            .insert(key.to_ascii_lowercase(), (key, value.into()));
    }

    /// Look up the first of several alias keys
    #[must_use]
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            self.entries
                .get(&alias.to_ascii_lowercase())
                .map(|(_, v)| v.as_str())
        })
    }

    /// Look up a required value
    pub fn require(&self, aliases: &[&str]) -> Result<&str, ConfigError> {
        self.get(aliases)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key: aliases.first().copied().unwrap_or_default().to_string(),
            })
    }

    /// Parse a value, or fall back to `default` when absent or blank
    pub fn parse_or<T: FromStr>(&self, aliases: &[&str], default: T) -> Result<T, ConfigError> {
        match self.get(aliases).map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::invalid(
                    aliases.first().copied().unwrap_or_default(),
                    value,
                    format!("expected {}", std::any::type_name::<T>()),
                )
            }),
            None => Ok(default),
        }
    }

    /// Parse a boolean (`true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`)
    pub fn bool_or(&self, aliases: &[&str], default: bool) -> Result<bool, ConfigError> {
        match self.get(aliases).map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::invalid(
                    aliases.first().copied().unwrap_or_default(),
                    value,
                    "expected a boolean",
                )
            }),
            None => Ok(default),
        }
    }

    /// Entries whose key starts with `prefix` (case-insensitive), with the
    /// prefix removed
    pub fn with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        let prefix = prefix.to_ascii_lowercase();
        self.entries.iter().filter_map(move |(lower, (key, value))| {
            lower
                .starts_with(&prefix)
                .then(|| (&key[prefix.len()..], value.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" => Some(true),
        "false" | "no" | "off" | "0" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_aliases() {
        let props: Properties = [("HostName", "lrgs.example.org"), ("PORT", "17000")]
            .into_iter()
            .collect();

        assert_eq!(props.get(&["host", "hostname"]), Some("lrgs.example.org"));
        assert_eq!(props.parse_or(&["port"], 16003u16).unwrap(), 17000);
        assert_eq!(props.parse_or(&["lrgs.retries"], 0u32).unwrap(), 0);
    }

    #[test]
    fn test_invalid_values() {
        let props: Properties = [("port", "abc"), ("single", "maybe")].into_iter().collect();
        assert!(matches!(
            props.parse_or(&["port"], 16003u16),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(props.bool_or(&["single"], false).is_err());
        assert!(matches!(
            props.require(&["username", "user"]),
            Err(ConfigError::Missing { key }) if key == "username"
        ));
    }

    #[test]
    fn test_prefixed_entries() {
        let props: Properties = [("sc:CHANNEL", "|101"), ("sc:SOURCE", "GOES"), ("host", "x")]
            .into_iter()
            .collect();
        let mut keys: Vec<_> = props.with_prefix("SC:").map(|(k, _)| k).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["CHANNEL", "SOURCE"]);
    }
}
