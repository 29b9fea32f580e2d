//! SHEF free-text header
//!
//! ```text
//! : comment lines are skipped
//! .E LOCID 231200 Z DH12/HG 1.2/...
//! ```
//!
//! The header is the record type, station id, date and optional zone.

use chrono::NaiveDate;
use tracing::warn;

use super::{HeaderParser, HeaderType, ParseFailure, ParsedHeader, ZoneLookup, lookup_zone};
use crate::message::{HeaderLength, keys};

/// Date field of a SHEF header, disambiguated by length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShefDate {
    /// `MMDD`; the year is assigned by the caller
    MonthDay {
        /// Month (1-12)
        month: u32,
        /// Day of month
        day: u32,
    },
    /// `yyMMdd` or `yyyyMMdd`
    Full {
        /// Four-digit year
        year: i32,
        /// Month (1-12)
        month: u32,
        /// Day of month
        day: u32,
    },
}

impl ShefDate {
    /// Parse a 4, 6 or 8 digit date field
    #[must_use]
    pub fn parse(field: &str) -> Option<Self> {
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let num = |range: std::ops::Range<usize>| field[range].parse::<u32>().ok();
        match field.len() {
            4 => Some(Self::MonthDay {
                month: num(0..2)?,
                day: num(2..4)?,
            }),
            6 => {
                let yy = num(0..2)?;
                let year = if yy < 70 { 2000 + yy } else { 1900 + yy };
                Some(Self::Full {
                    year: i32::try_from(year).ok()?,
                    month: num(2..4)?,
                    day: num(4..6)?,
                })
            }
            8 => Some(Self::Full {
                year: i32::try_from(num(0..4)?).ok()?,
                month: num(4..6)?,
                day: num(6..8)?,
            }),
            _ => None,
        }
    }

    /// Calendar date, if the year is known and the date exists
    #[must_use]
    pub fn to_date(self) -> Option<NaiveDate> {
        match self {
            Self::MonthDay { .. } => None,
            Self::Full { year, month, day } => NaiveDate::from_ymd_opt(year, month, day),
        }
    }
}

/// Parser for SHEF `.E`/`.A`/`.B` record headers
#[derive(Debug, Clone, Copy, Default)]
pub struct ShefParser;

impl ShefParser {
    /// Create a parser
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_blank_and_comments(&mut self) {
        loop {
            while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.data.get(self.pos) != Some(&b':') {
                return;
            }
            match self.data[self.pos..].iter().position(|&b| b == b'\n') {
                Some(nl) => self.pos += nl + 1,
                None => self.pos = self.data.len(),
            }
        }
    }

    fn skip_spaces(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b' ' || b == b'\t' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn token(&mut self) -> Option<(&'a str, usize)> {
        let start = self.pos;
        while self.pos < self.data.len() && !self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        let data = self.data;
        std::str::from_utf8(&data[start..self.pos])
            .ok()
            .map(|s| (s, self.pos))
    }
}

impl HeaderParser for ShefParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::Shef
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        let mut cursor = Cursor { data, pos: 0 };
        cursor.skip_blank_and_comments();
        let body = &data[cursor.pos..];

        let record_type = if cursor.peek() == Some(b'.') {
            let (token, _) = cursor
                .token()
                .ok_or_else(|| ParseFailure::new("bad SHEF record type", body))?;
            cursor.skip_spaces();
            Some(token)
        } else {
            None
        };

        let (station, _) = cursor
            .token()
            .ok_or_else(|| ParseFailure::new("SHEF header has no station id", body))?;
        cursor.skip_spaces();

        let (date_field, mut end) = cursor
            .token()
            .ok_or_else(|| ParseFailure::new("SHEF header has no date", body))?;
        let date = ShefDate::parse(date_field).ok_or_else(|| {
            ParseFailure::new(
                format!("invalid SHEF date '{date_field}' (need 4, 6 or 8 digits)"),
                body,
            )
        })?;

        // No zone code starts with 'D'; those fields are data type codes.
        cursor.skip_spaces();
        let mut zone = ZoneLookup::Unknown;
        let mut zone_name = "UTC".to_string();
        if let Some(first) = cursor.peek() {
            if !first.is_ascii_whitespace() && !first.eq_ignore_ascii_case(&b'D') {
                if let Some((code, zone_end)) = cursor.token() {
                    end = zone_end;
                    zone = lookup_zone(code);
                    match zone {
                        ZoneLookup::Unknown => {
                            warn!(zone = code, station, "unknown SHEF time zone, using UTC");
                        }
                        ZoneLookup::Named(tz) => zone_name = tz.name().to_string(),
                        ZoneLookup::Known(_) if !zone.is_utc() => {
                            zone_name = code.to_ascii_uppercase();
                        }
                        ZoneLookup::Known(_) => {}
                    }
                }
            }
        }

        let timestamp = match date {
            ShefDate::MonthDay { .. } => None,
            ShefDate::Full { .. } => {
                let midnight = date.to_date().and_then(|d| d.and_hms_opt(0, 0, 0));
                let ts = midnight.and_then(|naive| zone.to_utc(&naive));
                if ts.is_none() {
                    warn!(date = date_field, station, "SHEF date is not a calendar date");
                }
                ts
            }
        };

        let mut header = ParsedHeader::new(station, timestamp, HeaderLength::Fixed(end));
        header.set(keys::FAILURE_CODE, 'G');
        header.set(keys::TIME_ZONE, zone_name);
        if let Some(record_type) = record_type {
            header.set(keys::RECORD_TYPE, record_type);
        }
        if let ShefDate::MonthDay { month, day } = date {
            header.set(keys::MONTH_DAY, format!("{month:02}{day:02}"));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TypedValue;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_date_lengths() {
        assert_eq!(
            ShefDate::parse("0512"),
            Some(ShefDate::MonthDay { month: 5, day: 12 })
        );
        assert_eq!(
            ShefDate::parse("100512"),
            Some(ShefDate::Full {
                year: 2010,
                month: 5,
                day: 12
            })
        );
        assert_eq!(
            ShefDate::parse("19990101"),
            Some(ShefDate::Full {
                year: 1999,
                month: 1,
                day: 1
            })
        );
        assert_eq!(ShefDate::parse("12"), None);
        assert_eq!(ShefDate::parse("10051"), None);
        assert_eq!(ShefDate::parse("1005x2"), None);
    }

    #[test]
    fn test_header_with_zone() {
        let data = b".A BRCW1 20100512 C DH12/HG 1.23";
        let header = ShefParser.parse_header(data).unwrap();

        assert_eq!(header.medium_id, "BRCW1");
        assert_eq!(
            header.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 5, 12, 6, 0, 0).unwrap())
        );
        let start = header.header_length.fixed().unwrap();
        assert_eq!(&data[start..], b" DH12/HG 1.23");
        assert_eq!(
            header.get(keys::TIME_ZONE),
            Some(&TypedValue::Str("C".to_string()))
        );
    }

    #[test]
    fn test_data_code_is_not_a_zone() {
        let data = b".E LOCID 100512 DH1200/HG 1.0";
        let header = ShefParser.parse_header(data).unwrap();
        let start = header.header_length.fixed().unwrap();
        assert_eq!(&data[start..], b" DH1200/HG 1.0");
    }

    #[test]
    fn test_month_day_has_no_timestamp() {
        let header = ShefParser.parse_header(b".E LOCID 0512 Z").unwrap();
        assert_eq!(header.timestamp, None);
        assert_eq!(
            header.get(keys::MONTH_DAY),
            Some(&TypedValue::Str("0512".to_string()))
        );
    }

    #[test]
    fn test_unknown_zone_uses_utc() {
        let header = ShefParser.parse_header(b".E LOCID 100512 QQ").unwrap();
        assert_eq!(
            header.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 5, 12, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_bad_date_length() {
        let err = ShefParser.parse_header(b".E LOCID 10051 Z").unwrap_err();
        assert!(err.reason.contains("invalid SHEF date"));
    }
}
