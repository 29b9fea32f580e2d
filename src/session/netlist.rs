//! Network lists (device address lists sent to the server)

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

/// Network list could not be loaded
#[derive(Error, Debug)]
pub enum NetlistError {
    /// File could not be read
    #[error("cannot read network list '{path}': {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed
    #[error("network list '{name}' line {line}: {reason}")]
    Syntax {
        /// List name
        name: String,
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },
}

/// One device in a network list
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkListItem {
    /// Device address (upper-cased)
    pub address: String,
    /// Short name
    pub name: String,
    /// Free-text description
    pub description: String,
}

impl NetworkListItem {
    /// Create an item with no name or description
    pub fn new(address: impl AsRef<str>) -> Self {
        Self {
            address: address.as_ref().trim().to_ascii_uppercase(),
            name: String::new(),
            description: String::new(),
        }
    }

    /// Set the short name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Named list of device addresses
///
/// Text format, one device per line:
///
/// ```text
/// # comment
/// CE31D030:BIGRIVER Big River at Springfield
/// 16D5A1B2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkList {
    name: String,
    items: Vec<NetworkListItem>,
}

impl NetworkList {
    /// Create an empty list
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Name used on the server
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Devices in the list
    #[must_use]
    pub fn items(&self) -> &[NetworkListItem] {
        &self.items
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if an address is present (case-insensitive)
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.address.eq_ignore_ascii_case(address.trim()))
    }

    /// Add a device; duplicates are ignored.
    pub fn push(&mut self, item: NetworkListItem) {
        if !self.contains(&item.address) {
            self.items.push(item);
        }
    }

    /// Parse list text
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, NetlistError> {
        let mut list = Self::new(name);
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (address, rest) = match line.split_once(':') {
                Some((address, rest)) => (address.trim(), rest.trim()),
                None => (line, ""),
            };
            if address.is_empty() || !address.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(NetlistError::Syntax {
                    name: list.name,
                    line: idx + 1,
                    reason: format!("invalid address '{address}'"),
                });
            }

            let (item_name, description) = match rest.split_once(char::is_whitespace) {
                Some((n, d)) => (n, d.trim()),
                None => (rest, ""),
            };
            list.push(
                NetworkListItem::new(address)
                    .with_name(item_name)
                    .with_description(description),
            );
        }
        Ok(list)
    }

    /// Load a list file; the list is named after the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetlistError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NetlistError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::parse(name, &text)
    }

    /// Render in the text format accepted by [`NetworkList::parse`]
    #[must_use]
    pub fn to_file_string(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(&item.address);
            if !item.name.is_empty() || !item.description.is_empty() {
                let _ = write!(out, ":{}", item.name);
                if !item.description.is_empty() {
                    let _ = write!(out, " {}", item.description);
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let text = "# Springfield sites\n\nce31d030:BIGRIVER Big River at Springfield\n16D5A1B2\n";
        let list = NetworkList::parse("springfield.nl", text).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.items()[0].address, "CE31D030");
        assert_eq!(list.items()[0].name, "BIGRIVER");
        assert_eq!(list.items()[0].description, "Big River at Springfield");
        assert_eq!(list.items()[1].name, "");
        assert!(list.contains("16d5a1b2"));
    }

    #[test]
    fn test_file_string_reparses() {
        let mut list = NetworkList::new("x.nl");
        list.push(NetworkListItem::new("CE31D030").with_name("BIG").with_description("Big River"));
        list.push(NetworkListItem::new("16D5A1B2"));
        list.push(NetworkListItem::new("16d5a1b2"));
        assert_eq!(list.to_file_string(), "CE31D030:BIG Big River\n16D5A1B2\n");
        assert_eq!(NetworkList::parse("x.nl", &list.to_file_string()).unwrap(), list);
    }

    #[test]
    fn test_bad_address() {
        let err = NetworkList::parse("bad.nl", "CE31D030\nnot an address\n").unwrap_err();
        assert!(matches!(err, NetlistError::Syntax { line: 2, .. }));
    }
}
