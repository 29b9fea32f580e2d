//! Search criteria sent to the server before streaming

use std::fmt;
use std::fmt::Write as _;

use crate::config::{ConfigError, Properties};

use super::netlist::{NetworkList, NetworkListItem};

/// Maximum explicit addresses sent inline; the rest go in temporary lists
pub const MAX_EXPLICIT_ADDRESSES: usize = 500;

/// Accept / reject / exclusive selector for DAPS status and parity errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// Include matching messages
    Accept,
    /// Exclude matching messages
    Reject,
    /// Only matching messages
    Exclusive,
}

impl FilterMode {
    /// Parse from the first character (`A`, `R`, `O`, or `Y`/`N`)
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' | 'Y' => Some(Self::Accept),
            'R' | 'N' => Some(Self::Reject),
            'O' => Some(Self::Exclusive),
            _ => None,
        }
    }

    const fn as_char(self) -> char {
        match self {
            Self::Accept => 'A',
            Self::Reject => 'R',
            Self::Exclusive => 'O',
        }
    }
}

/// GOES spacecraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Spacecraft {
    /// GOES East
    East,
    /// GOES West
    West,
}

/// One channel selector
///
/// `|n` adds channel `n`; `&n` restricts to it. A run of consecutive `&`
/// tokens is sent as a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelToken {
    /// GOES channel number
    pub channel: u16,
    /// Restrictive (`&`) rather than additive (`|`)
    pub and: bool,
}

impl ChannelToken {
    /// Parse `n`, `|n`, `&n` or a range `a-b`
    pub fn parse(token: &str) -> Result<Vec<Self>, ConfigError> {
        let token = token.trim();
        let bad = || ConfigError::invalid("channel", token, "expected n, |n, &n or a-b");

        if let Some((start, end)) = token.split_once('-') {
            let start: u16 = start.trim().parse().map_err(|_| bad())?;
            let end: u16 = end.trim().parse().map_err(|_| bad())?;
            if end < start {
                return Err(bad());
            }
            return Ok((start..=end)
                .map(|channel| Self { channel, and: true })
                .collect());
        }

        let (and, digits) = match token.as_bytes().first() {
            Some(b'&') => (true, &token[1..]),
            Some(b'|') => (false, &token[1..]),
            _ => (false, token),
        };
        let channel = digits.trim().parse().map_err(|_| bad())?;
        Ok(vec![Self { channel, and }])
    }
}

/// Message selection for a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchCriteria {
    /// Start time (server time expression, e.g. `now - 1 hour`)
    pub since: Option<String>,
    /// End time; the server reports until-reached after it
    pub until: Option<String>,
    /// Server-side network list names
    pub netlists: Vec<String>,
    /// Device names
    pub dcp_names: Vec<String>,
    /// Explicit device addresses
    pub addresses: Vec<String>,
    /// Channel selectors
    pub channels: Vec<ChannelToken>,
    /// DAPS status messages
    pub daps_status: Option<FilterMode>,
    /// Spacecraft
    pub spacecraft: Option<Spacecraft>,
    /// Source names (`GOES_SELFTIMED`, `IRIDIUM`, `NETDCP`, ...)
    pub sources: Vec<String>,
    /// Messages with parity errors
    pub parity_error: Option<FilterMode>,
    /// Deliver in ascending time order only
    pub ascending_time: bool,
    /// Hold realtime messages briefly so retransmissions settle
    pub rt_settle_delay: bool,
    /// Single-message mode
    pub single: bool,
}

impl SearchCriteria {
    /// Create empty criteria (everything)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit device address
    pub fn add_address(&mut self, address: &str) {
        let address = address.trim().to_ascii_uppercase();
        if !address.is_empty() && !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
    }

    /// Add a server-side network list name
    pub fn add_netlist(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.netlists.contains(&name) {
            self.netlists.push(name);
        }
    }

    /// Add a channel token (see [`ChannelToken::parse`])
    pub fn add_channel_token(&mut self, token: &str) -> Result<(), ConfigError> {
        self.channels.extend(ChannelToken::parse(token)?);
        Ok(())
    }

    /// Check if any selection is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build from flat properties.
    ///
    /// Reads `since`, `until`, `dcpaddress`, `channel` (colon separated),
    /// `single`, `ascendingTimeOnly` and the `sc:*` keys (`sc:CHANNEL*`,
    /// `sc:DCP_ADDRESS*`, `sc:DCP_NAME*`, `sc:SOURCE*`, `sc:NETWORKLIST*`,
    /// `sc:DAPS_STATUS`, `sc:SPACECRAFT`, `sc:PARITY_ERROR`,
    /// `sc:ASCENDING_TIME`, `sc:RT_SETTLE_DELAY`).
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let mut crit = Self::new();

        let mut sc: Vec<(&str, &str)> = props
            .with_prefix("sc:")
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        sc.sort_unstable();
        for (key, value) in sc {
            let value = value.trim();
            let upper = key.to_ascii_uppercase();
            let first = value.chars().next().unwrap_or(' ');
            match upper.as_str() {
                k if k.starts_with("CHANNEL") => crit.add_channel_token(value)?,
                k if k.starts_with("DCP_ADDRESS") => crit.add_address(value),
                k if k.starts_with("DCP_NAME") => crit.dcp_names.push(value.to_string()),
                k if k.starts_with("SOURCE") => crit.sources.push(value.to_ascii_uppercase()),
                k if k.starts_with("NETWORKLIST") => crit.add_netlist(value),
                "DAPS_STATUS" => {
                    crit.daps_status = Some(FilterMode::from_char(first).ok_or_else(|| {
                        ConfigError::invalid("sc:DAPS_STATUS", value, "expected A, R or O")
                    })?);
                }
                "PARITY_ERROR" => {
                    crit.parity_error = Some(FilterMode::from_char(first).ok_or_else(|| {
                        ConfigError::invalid("sc:PARITY_ERROR", value, "expected A, R or O")
                    })?);
                }
                "SPACECRAFT" => {
                    crit.spacecraft = Some(match first.to_ascii_uppercase() {
                        'E' => Spacecraft::East,
                        'W' => Spacecraft::West,
                        _ => {
                            return Err(ConfigError::invalid(
                                "sc:SPACECRAFT",
                                value,
                                "expected E or W",
                            ));
                        }
                    });
                }
                "ASCENDING_TIME" => {
                    crit.ascending_time = props.bool_or(&["sc:ASCENDING_TIME"], false)?;
                }
                "RT_SETTLE_DELAY" => {
                    crit.rt_settle_delay = props.bool_or(&["sc:RT_SETTLE_DELAY"], false)?;
                }
                _ => {}
            }
        }

        if let Some(since) = props.get(&["since"]).filter(|s| !s.trim().is_empty()) {
            crit.since = Some(since.trim().to_string());
        }
        if let Some(until) = props.get(&["until"]).filter(|s| !s.trim().is_empty()) {
            crit.until = Some(until.trim().to_string());
        }
        if let Some(addr) = props.get(&["dcpaddress"]) {
            crit.add_address(addr);
        }
        if let Some(channels) = props.get(&["channel"]) {
            for token in channels.split(':').filter(|t| !t.trim().is_empty()) {
                crit.add_channel_token(token)?;
            }
        }
        if props.get(&["ascendingTimeOnly"]).is_some() {
            crit.ascending_time = props.bool_or(&["ascendingTimeOnly"], false)?;
        }
        crit.single = props.bool_or(&["single"], crit.single)?;
        Ok(crit)
    }

    /// Move explicit addresses beyond [`MAX_EXPLICIT_ADDRESSES`] into
    /// temporary network lists named `searchcrit_N.nl`, referencing each
    /// list from the criteria. Returns the lists to upload first.
    pub fn split_explicit_addresses(&mut self) -> Vec<NetworkList> {
        let mut lists = Vec::new();
        while self.addresses.len() > MAX_EXPLICIT_ADDRESSES {
            let name = format!("searchcrit_{}.nl", lists.len() + 1);
            let mut list = NetworkList::new(name.clone());
            for address in self.addresses.drain(..MAX_EXPLICIT_ADDRESSES) {
                list.push(NetworkListItem::new(address));
            }
            self.add_netlist(name);
            lists.push(list);
        }
        lists
    }

    /// Render the criteria file sent to the server
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    fn write_channels(&self, out: &mut String) {
        let Some(first) = self.channels.first() else {
            return;
        };

        if self.channels.len() > 1 && first.and {
            let mut last = first.channel;
            let contiguous = self.channels[1..].iter().all(|tok| {
                let next = tok.and && last.checked_add(1) == Some(tok.channel);
                last = tok.channel;
                next
            });
            if contiguous {
                let _ = writeln!(out, "CHANNEL: {}-{last}", first.channel);
                return;
            }
        }

        for tok in &self.channels {
            let sign = if tok.and { '&' } else { '|' };
            let _ = writeln!(out, "CHANNEL: {sign}{}", tok.channel);
        }
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("#\n# LRGS Search Criteria\n#\n");

        if let Some(since) = &self.since {
            let _ = writeln!(out, "DRS_SINCE: {since}");
        }
        if let Some(until) = &self.until {
            let _ = writeln!(out, "DRS_UNTIL: {until}");
        }
        for name in &self.netlists {
            let _ = writeln!(out, "NETWORKLIST: {name}");
        }
        for name in &self.dcp_names {
            let _ = writeln!(out, "DCP_NAME: {name}");
        }
        for address in &self.addresses {
            let _ = writeln!(out, "DCP_ADDRESS: {address}");
        }
        if let Some(mode) = self.daps_status {
            let _ = writeln!(out, "DAPS_STATUS: {}", mode.as_char());
        }
        self.write_channels(&mut out);
        for source in &self.sources {
            let _ = writeln!(out, "SOURCE: {source}");
        }
        if let Some(sc) = self.spacecraft {
            let c = match sc {
                Spacecraft::East => 'E',
                Spacecraft::West => 'W',
            };
            let _ = writeln!(out, "SPACECRAFT: {c}");
        }
        if self.ascending_time {
            out.push_str("ASCENDING_TIME: true\n");
        }
        if self.rt_settle_delay {
            out.push_str("RT_SETTLE_DELAY: true\n");
        }
        if self.single {
            out.push_str("SINGLE: true\n");
        }
        if let Some(mode) = self.parity_error.filter(|m| *m != FilterMode::Accept) {
            let _ = writeln!(out, "PARITY_ERROR: {}", mode.as_char());
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lines() {
        let mut crit = SearchCriteria::new();
        crit.since = Some("now - 1 hour".into());
        crit.add_address("ce31d030");
        crit.add_netlist("springfield.nl");
        crit.daps_status = Some(FilterMode::Reject);
        crit.spacecraft = Some(Spacecraft::East);
        crit.sources.push("GOES_SELFTIMED".into());
        crit.ascending_time = true;
        crit.single = true;
        crit.parity_error = Some(FilterMode::Accept);

        let text = crit.to_text();
        assert!(text.starts_with("#\n# LRGS Search Criteria\n#\n"));
        assert!(text.contains("DRS_SINCE: now - 1 hour\n"));
        assert!(text.contains("DCP_ADDRESS: CE31D030\n"));
        assert!(text.contains("NETWORKLIST: springfield.nl\n"));
        assert!(text.contains("DAPS_STATUS: R\n"));
        assert!(text.contains("SPACECRAFT: E\n"));
        assert!(text.contains("SOURCE: GOES_SELFTIMED\n"));
        assert!(text.contains("ASCENDING_TIME: true\n"));
        assert!(text.contains("SINGLE: true\n"));
        assert!(!text.contains("PARITY_ERROR"));
        assert!(!text.contains("RT_SETTLE_DELAY"));
    }

    #[test]
    fn test_channel_tokens() {
        let mut crit = SearchCriteria::new();
        crit.add_channel_token("100-103").unwrap();
        assert!(crit.to_text().contains("CHANNEL: 100-103\n"));

        let mut crit = SearchCriteria::new();
        crit.add_channel_token("7").unwrap();
        crit.add_channel_token("&9").unwrap();
        let text = crit.to_text();
        assert!(text.contains("CHANNEL: |7\nCHANNEL: &9\n"));

        assert!(ChannelToken::parse("x").is_err());
        assert!(ChannelToken::parse("9-3").is_err());
    }

    #[test]
    fn test_split_explicit_addresses() {
        let mut crit = SearchCriteria::new();
        for i in 0..1_203 {
            crit.add_address(&format!("{i:08X}"));
        }
        let lists = crit.split_explicit_addresses();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].name(), "searchcrit_1.nl");
        assert_eq!(lists[0].len(), 500);
        assert_eq!(lists[1].name(), "searchcrit_2.nl");
        assert_eq!(crit.addresses.len(), 203);
        assert_eq!(crit.netlists, vec!["searchcrit_1.nl", "searchcrit_2.nl"]);
        assert_eq!(lists[1].items()[0].address, "000001F4");
    }

    #[test]
    fn test_from_properties() {
        let props: Properties = [
            ("since", "now - 2 hours"),
            ("dcpaddress", "ce31d030"),
            ("channel", "7:&9"),
            ("sc:DCP_ADDRESS_1", "16D5A1B2"),
            ("sc:SPACECRAFT", "west"),
            ("sc:DAPS_STATUS", "O"),
            ("sc:ascending_time", "true"),
            ("sc:SOURCE", "iridium"),
            ("single", "true"),
        ]
        .into_iter()
        .collect();

        let crit = SearchCriteria::from_properties(&props).unwrap();
        assert_eq!(crit.since.as_deref(), Some("now - 2 hours"));
        assert_eq!(crit.addresses, vec!["16D5A1B2", "CE31D030"]);
        assert_eq!(crit.channels.len(), 2);
        assert_eq!(crit.spacecraft, Some(Spacecraft::West));
        assert_eq!(crit.daps_status, Some(FilterMode::Exclusive));
        assert_eq!(crit.sources, vec!["IRIDIUM"]);
        assert!(crit.ascending_time);
        assert!(crit.single);
    }

    #[test]
    fn test_bad_spacecraft() {
        let props: Properties = [("sc:SPACECRAFT", "north")].into_iter().collect();
        assert!(SearchCriteria::from_properties(&props).is_err());
    }
}
