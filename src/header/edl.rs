//! Electronic data logger (network DCP) header
//!
//! ```text
//! //STATION BRC01
//! //DEVICE 5A3F0012
//! //SOURCE polled-tcp
//! //BEGIN TIME 2010/05/12 11:00:00
//! //DEVICE END TIME 2010/05/12 12:00:00
//! //TIMEZONE EST
//! <data...>
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use super::{HeaderParser, HeaderType, ParseFailure, ParsedHeader, ZoneLookup, lookup_zone};
use crate::message::{HeaderLength, keys};

const TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%j %H:%M:%S",
    "%Y/%j/%H:%M:%S",
];

/// Parser for `//KEY value` EDL headers
#[derive(Debug, Clone, Copy, Default)]
pub struct EdlParser;

impl EdlParser {
    /// Create a parser
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct Fields<'a> {
    station: Option<&'a str>,
    device: Option<&'a str>,
    source: Option<&'a str>,
    begin: Option<&'a str>,
    end: Option<&'a str>,
    zone: Option<&'a str>,
}

fn split_key(line: &str) -> (&str, &str) {
    const MULTI_WORD: &[&str] = &["DEVICE END TIME", "END TIME", "BEGIN TIME"];
    for key in MULTI_WORD {
        if let Some(head) = line.get(..key.len()) {
            if head.eq_ignore_ascii_case(key) {
                return (key, line[key.len()..].trim());
            }
        }
    }
    match line.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (line, ""),
    }
}

fn parse_time(value: &str, zone: ZoneLookup) -> Option<DateTime<Utc>> {
    let naive = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y/%m/%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    zone.to_utc(&naive)
}

impl HeaderParser for EdlParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::Edl
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        if !data.starts_with(b"//") {
            return Err(ParseFailure::new("not an EDL header (missing '//')", data));
        }

        let text = String::from_utf8_lossy(data);
        let mut fields = Fields::default();
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            let Some(body) = line.strip_prefix("//") else {
                break;
            };
            offset += line.len();

            let (key, value) = split_key(body.trim_end());
            let slot = match key.to_ascii_uppercase().as_str() {
                "STATION" => &mut fields.station,
                "DEVICE" => &mut fields.device,
                "SOURCE" => &mut fields.source,
                "BEGIN TIME" => &mut fields.begin,
                "END TIME" | "DEVICE END TIME" => &mut fields.end,
                "TIMEZONE" => &mut fields.zone,
                _ => continue,
            };
            if !value.is_empty() {
                *slot = Some(value);
            }
        }

        let medium_id = fields
            .device
            .or(fields.station)
            .ok_or_else(|| ParseFailure::new("EDL header has no STATION or DEVICE", data))?;

        let zone = match fields.zone {
            Some(code) => {
                let lookup = lookup_zone(code);
                if lookup == ZoneLookup::Unknown {
                    warn!(zone = code, "unknown EDL time zone, assuming UTC");
                }
                lookup
            }
            None => ZoneLookup::Unknown,
        };

        let time_of = |value: Option<&str>, what: &str| match value {
            Some(v) => parse_time(v, zone)
                .map(Some)
                .ok_or_else(|| ParseFailure::new(format!("invalid EDL {what} '{v}'"), data)),
            None => Ok(None),
        };
        let begin = time_of(fields.begin, "BEGIN TIME")?;
        let end = time_of(fields.end, "END TIME")?;

        let mut header = ParsedHeader::new(
            medium_id.to_string(),
            end.or(begin),
            HeaderLength::Fixed(offset.min(data.len())),
        );
        header.set(keys::FAILURE_CODE, 'G');
        if let Some(station) = fields.station {
            header.set(keys::STATION, station);
        }
        if let Some(source) = fields.source {
            header.set(keys::SOURCE, source);
        }
        if let Some(code) = fields.zone {
            header.set(keys::TIME_ZONE, code);
        }
        if let Some(begin) = begin {
            header.set(keys::BEGIN_TIME, begin);
        }
        if let Some(end) = end {
            header.set(keys::DEVICE_END_TIME, end);
        }
        Ok(header)
    }
}
