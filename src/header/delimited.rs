//! Delimited (CSV) data-logger header

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::{HeaderParser, HeaderType, ParseFailure, ParsedHeader, ZoneLookup, lookup_zone};
use crate::config::{ConfigError, Properties};
use crate::message::{HeaderLength, keys};

/// Seconds added to every parsed timestamp. Upstream loggers stamp the end
/// of the recording interval one second early.
const TIMESTAMP_ADJUST_SECS: i64 = 1;

/// Column layout of a delimited header
///
/// Columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedConfig {
    /// Column holding the medium id
    pub id_col: usize,
    /// First column of the timestamp
    pub datetime_col: Option<usize>,
    /// Date pattern (`yyyy/MM/dd HH:mm:ss` letter syntax)
    pub datetime_fmt: String,
    /// Zone in which timestamps are expressed
    pub timezone: String,
    /// First data column; unset means variable-length framing
    pub data_col: Option<usize>,
    /// Field delimiter
    pub delim: String,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            id_col: 1,
            datetime_col: None,
            datetime_fmt: "yyyy/MM/dd HH:mm:ss".to_string(),
            timezone: "UTC".to_string(),
            data_col: None,
            delim: ",".to_string(),
        }
    }
}

impl DelimitedConfig {
    /// Read `idcol`, `datetimecol`, `datetimefmt`, `timezone`|`tz`,
    /// `datacol` and `delim`. `idcol` is required.
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let column = |key: &str| -> Result<Option<usize>, ConfigError> {
            match props.get(&[key]).map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => match v.parse::<usize>() {
                    Ok(n) if n >= 1 => Ok(Some(n)),
                    _ => Err(ConfigError::invalid(key, v, "expected a column number >= 1")),
                },
                None => Ok(None),
            }
        };

        let id_col = column("idcol")?.ok_or_else(|| ConfigError::Missing {
            key: "idcol".to_string(),
        })?;

        Ok(Self {
            id_col,
            datetime_col: column("datetimecol")?,
            datetime_fmt: props
                .get(&["datetimefmt"])
                .map_or(defaults.datetime_fmt, str::to_string),
            timezone: props
                .get(&["timezone", "tz"])
                .map_or(defaults.timezone, str::to_string),
            data_col: column("datacol")?,
            delim: props
                .get(&["delim"])
                .map_or(defaults.delim, unescape_delim),
        })
    }
}

fn unescape_delim(raw: &str) -> String {
    match raw {
        "\\t" | "tab" | "TAB" => "\t".to_string(),
        "space" | "SPACE" => " ".to_string(),
        other => other.to_string(),
    }
}

/// A date pattern compiled to a chrono format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    format: String,
    has_time: bool,
}

impl DatePattern {
    /// Compile a pattern such as `MMM,dd,yyyy,HH:mm`
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut format = String::new();
        let mut has_time = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                // Quoted literal; '' is a single quote.
                let mut j = i + 1;
                if chars.get(j) == Some(&'\'') {
                    format.push('\'');
                    i = j + 1;
                    continue;
                }
                while j < chars.len() && chars[j] != '\'' {
                    push_literal(&mut format, chars[j]);
                    j += 1;
                }
                if j == chars.len() {
                    return Err(ConfigError::invalid(
                        "datetimefmt",
                        pattern,
                        "unterminated quote",
                    ));
                }
                i = j + 1;
                continue;
            }

            if !c.is_ascii_alphabetic() {
                push_literal(&mut format, c);
                i += 1;
                continue;
            }

            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            let directive = match (c, run) {
                ('y', 2) => "%y",
                ('y', _) => "%Y",
                ('M', 1 | 2) => "%m",
                ('M', 3) => "%b",
                ('M', _) => "%B",
                ('d', _) => "%d",
                ('D', _) => "%j",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                ('a', _) => "%p",
                ('H', _) => "%H",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                ('S', _) => "%3f",
                ('Z' | 'X' | 'z', _) => "%z",
                _ => {
                    return Err(ConfigError::invalid(
                        "datetimefmt",
                        pattern,
                        format!("unsupported pattern letter '{c}'"),
                    ));
                }
            };
            has_time |= matches!(c, 'H' | 'h' | 'm' | 's' | 'S');
            format.push_str(directive);
            i += run;
        }

        Ok(Self {
            source: pattern.to_string(),
            format,
            has_time,
        })
    }

    /// Pattern as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled chrono format
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parse local date-time text; patterns without a time give midnight
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.format).ok()
        } else {
            NaiveDate::parse_from_str(text, &self.format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    }
}

fn push_literal(format: &mut String, c: char) {
    if c == '%' {
        format.push_str("%%");
    } else {
        format.push(c);
    }
}

/// Parser for delimited data-logger messages
#[derive(Debug, Clone)]
pub struct DelimitedParser {
    config: DelimitedConfig,
    pattern: DatePattern,
    zone: ZoneLookup,
    datetime_fields: usize,
}

impl DelimitedParser {
    /// Create a parser, compiling the date pattern
    pub fn new(config: DelimitedConfig) -> Result<Self, ConfigError> {
        let (pattern, zone, datetime_fields) = Self::derive(&config)?;
        Ok(Self {
            config,
            pattern,
            zone,
            datetime_fields,
        })
    }

    /// Replace the configuration, re-deriving the compiled pattern.
    ///
    /// On error the previous configuration stays in effect.
    pub fn configure(&mut self, config: DelimitedConfig) -> Result<(), ConfigError> {
        let (pattern, zone, datetime_fields) = Self::derive(&config)?;
        self.config = config;
        self.pattern = pattern;
        self.zone = zone;
        self.datetime_fields = datetime_fields;
        Ok(())
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &DelimitedConfig {
        &self.config
    }

    fn derive(config: &DelimitedConfig) -> Result<(DatePattern, ZoneLookup, usize), ConfigError> {
        if config.delim.is_empty() {
            return Err(ConfigError::invalid("delim", "", "delimiter cannot be empty"));
        }
        let pattern = DatePattern::compile(&config.datetime_fmt)?;
        let zone = lookup_zone(&config.timezone);
        if zone == ZoneLookup::Unknown {
            return Err(ConfigError::invalid(
                "timezone",
                &config.timezone,
                "unknown time zone",
            ));
        }
        let datetime_fields = config.datetime_fmt.matches(config.delim.as_str()).count() + 1;
        Ok((pattern, zone, datetime_fields))
    }

    /// Byte offset where column `col` (1-based) starts
    fn column_start(&self, data: &[u8], col: usize) -> Option<usize> {
        if col <= 1 {
            return Some(0);
        }
        let delim = self.config.delim.as_bytes();
        let mut found = 0;
        let mut pos = 0;
        while pos + delim.len() <= data.len() {
            if &data[pos..pos + delim.len()] == delim {
                found += 1;
                pos += delim.len();
                if found == col - 1 {
                    return Some(pos);
                }
            } else {
                pos += 1;
            }
        }
        None
    }

    /// Text of `count` columns starting at `col`
    fn columns<'a>(&self, data: &'a [u8], col: usize, count: usize) -> Option<&'a [u8]> {
        let start = self.column_start(data, col)?;
        let end = self
            .column_start(data, col + count)
            .map_or(data.len(), |next| next - self.config.delim.len());
        let span = &data[start..end.max(start)];
        let line_end = span
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .unwrap_or(span.len());
        Some(&span[..line_end])
    }
}

impl HeaderParser for DelimitedParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::Delimited
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        let cfg = &self.config;

        let id = self
            .columns(data, cfg.id_col, 1)
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ParseFailure::new("missing id column", data)
                    .with_setting(format!("idcol={}", cfg.id_col))
            })?;

        let timestamp = match cfg.datetime_col {
            Some(col) => {
                let setting = || format!("datetimecol={col} datetimefmt={}", cfg.datetime_fmt);
                let raw = self
                    .columns(data, col, self.datetime_fields)
                    .ok_or_else(|| {
                        ParseFailure::new("missing timestamp column", data).with_setting(setting())
                    })?;
                let text = String::from_utf8_lossy(raw);
                let local = self.pattern.parse(text.trim()).ok_or_else(|| {
                    ParseFailure::new(format!("cannot parse timestamp '{}'", text.trim()), data)
                        .with_setting(setting())
                })?;
                let utc = self.zone.to_utc(&local).ok_or_else(|| {
                    ParseFailure::new("timestamp out of range", data).with_setting(setting())
                })?;
                Some(utc + Duration::seconds(TIMESTAMP_ADJUST_SECS))
            }
            None => None,
        };

        let header_length = match cfg.data_col {
            Some(col) => HeaderLength::Fixed(self.column_start(data, col).ok_or_else(|| {
                ParseFailure::new("missing data column", data)
                    .with_setting(format!("datacol={col}"))
            })?),
            None => HeaderLength::Variable,
        };

        let mut header = ParsedHeader::new(id, timestamp, header_length);
        header.set(keys::FAILURE_CODE, 'G');
        header.set(keys::TIME_ZONE, cfg.timezone.clone());
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parser(fmt: &str, data_col: Option<usize>) -> DelimitedParser {
        DelimitedParser::new(DelimitedConfig {
            id_col: 1,
            datetime_col: Some(2),
            datetime_fmt: fmt.to_string(),
            data_col,
            ..DelimitedConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_pattern_compiles() {
        let p = DatePattern::compile("MMM,dd,yyyy,HH:mm").unwrap();
        assert_eq!(p.format(), "%b,%d,%Y,%H:%M");
        let p = DatePattern::compile("yyyy-MM-dd'T'HH:mm:ss.SSS").unwrap();
        assert_eq!(p.format(), "%Y-%m-%dT%H:%M:%S.%3f");
        assert!(DatePattern::compile("yyyy/Q").is_err());
    }

    #[test]
    fn test_date_only_pattern() {
        let header = parser("yyyy/MM/dd", Some(3))
            .parse_header(b"ST1,2010/05/12,7.5")
            .unwrap();
        assert_eq!(
            header.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 5, 12, 0, 0, 1).unwrap())
        );
    }

    #[test]
    fn test_timezone_applied() {
        let mut p = parser("yyyy/MM/dd HH:mm:ss", Some(3));
        let mut cfg = p.config().clone();
        cfg.timezone = "EST".to_string();
        p.configure(cfg).unwrap();

        let header = p.parse_header(b"ST1,2010/05/12 06:00:00,7.5").unwrap();
        assert_eq!(
            header.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 5, 12, 11, 0, 1).unwrap())
        );
    }

    #[test]
    fn test_iana_timezone_observes_daylight_saving() {
        let mut p = parser("yyyy/MM/dd HH:mm:ss", Some(3));
        let mut cfg = p.config().clone();
        cfg.timezone = "America/Chicago".to_string();
        p.configure(cfg).unwrap();

        let summer = p.parse_header(b"ST1,2010/07/01 06:00:00,7.5").unwrap();
        assert_eq!(
            summer.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 7, 1, 11, 0, 1).unwrap())
        );
        let winter = p.parse_header(b"ST1,2010/01/15 06:00:00,7.5").unwrap();
        assert_eq!(
            winter.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 1, 15, 12, 0, 1).unwrap())
        );

        let err = p.parse_header(b"ST1,2010/03/14 02:30:00,7.5").unwrap_err();
        assert_eq!(err.reason, "timestamp out of range");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut p = parser("yyyy/MM/dd", None);
        let mut cfg = p.config().clone();
        cfg.timezone = "America/Nowhere".to_string();
        assert!(matches!(
            p.configure(cfg),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_configure_keeps_old_config_on_error() {
        let mut p = parser("yyyy/MM/dd", None);
        let mut bad = p.config().clone();
        bad.datetime_fmt = "yyyy/QQ".to_string();
        assert!(p.configure(bad).is_err());
        assert_eq!(p.config().datetime_fmt, "yyyy/MM/dd");
    }

    #[test]
    fn test_missing_columns() {
        let p = parser("yyyy/MM/dd", Some(5));
        let err = p.parse_header(b"ST1").unwrap_err();
        assert_eq!(err.setting.as_deref(), Some("datetimecol=2 datetimefmt=yyyy/MM/dd"));

        let err = p.parse_header(b"ST1,2010/05/12,1").unwrap_err();
        assert_eq!(err.setting.as_deref(), Some("datacol=5"));
    }

    #[test]
    fn test_no_data_column_is_variable() {
        let header = parser("yyyy/MM/dd", None)
            .parse_header(b"ST1,2010/05/12,1,2")
            .unwrap();
        assert_eq!(header.header_length, HeaderLength::Variable);
    }

    #[test]
    fn test_from_properties() {
        let props: Properties = [
            ("idcol", "1"),
            ("datetimecol", "2"),
            ("datetimefmt", "MMM,dd,yyyy,HH:mm"),
            ("TZ", "UTC"),
            ("datacol", "6"),
            ("delim", "\\t"),
        ]
        .into_iter()
        .collect();
        let cfg = DelimitedConfig::from_properties(&props).unwrap();
        assert_eq!(cfg.data_col, Some(6));
        assert_eq!(cfg.delim, "\t");

        let missing = Properties::new();
        assert!(matches!(
            DelimitedConfig::from_properties(&missing),
            Err(ConfigError::Missing { .. })
        ));
    }
}
