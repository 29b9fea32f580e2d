//! Iridium SBD header
//!
//! `ID=<imei>,TIME=<yyDDDHHMMSS>,STAT=<n>,MO=<n>,MT=<n>,CDR=<n>,LAT=<f>,LON=<f>,RAD=<n> <data>`

use super::{HeaderParser, HeaderType, ParseFailure, ParsedHeader, parse_goes_time};
use crate::message::{HeaderLength, keys};

/// Session status values at or below this are successful transfers
const MAX_GOOD_SESSION_STATUS: i64 = 2;

/// Parser for Iridium `KEY=VALUE` headers
#[derive(Debug, Clone, Copy, Default)]
pub struct IridiumParser;

impl IridiumParser {
    /// Create a parser
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HeaderParser for IridiumParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::Iridium
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        let (header_end, data_start) = match data.iter().position(u8::is_ascii_whitespace) {
            Some(pos) => (pos, pos + 1),
            None => (data.len(), data.len()),
        };
        let text = std::str::from_utf8(&data[..header_end])
            .map_err(|_| ParseFailure::new("Iridium header is not ASCII", data))?;

        let mut id = None;
        let mut time = None;
        let mut extra = Vec::new();
        for field in text.split(',').filter(|f| !f.is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| ParseFailure::new(format!("bad Iridium field '{field}'"), data))?;
            match key.to_ascii_uppercase().as_str() {
                "ID" => id = Some(value),
                "TIME" => time = Some(value),
                other => extra.push((other.to_string(), value)),
            }
        }

        let id = id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ParseFailure::new("Iridium header has no ID", data))?;
        let time = time.ok_or_else(|| ParseFailure::new("Iridium header has no TIME", data))?;
        let timestamp = parse_goes_time(time.as_bytes())
            .ok_or_else(|| ParseFailure::new(format!("invalid Iridium TIME '{time}'"), data))?;

        let mut header =
            ParsedHeader::new(id, Some(timestamp), HeaderLength::Fixed(data_start));
        header.set(keys::FAILURE_CODE, 'G');

        for (key, value) in extra {
            let name = match key.as_str() {
                "STAT" => keys::SESSION_STATUS,
                "MO" => keys::MO_MSG_NUM,
                "MT" => keys::MT_MSG_NUM,
                "CDR" => keys::CDR_REFERENCE,
                "LAT" => keys::LATITUDE,
                "LON" => keys::LONGITUDE,
                "RAD" => keys::CEP_RADIUS,
                _ => continue,
            };
            if matches!(key.as_str(), "LAT" | "LON") {
                if let Ok(v) = value.parse::<f64>() {
                    header.set(name, v);
                }
                continue;
            }
            match value.parse::<i64>() {
                Ok(v) => {
                    if key == "STAT" && v > MAX_GOOD_SESSION_STATUS {
                        header.set(keys::FAILURE_CODE, '?');
                    }
                    header.set(name, v);
                }
                Err(_) => header.set(name, value),
            }
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
    fn test_iridium_header() {
        let data =
            b"ID=300234010123450,TIME=10132120000,STAT=0,MO=12,MT=0,CDR=5321,LAT=38.9,LON=-77.0,RAD=4 01AB";
        let header = IridiumParser.parse_header(data).unwrap();

        assert_eq!(header.medium_id, "300234010123450");
        assert_eq!(
            header.timestamp,
            Some(Utc.with_ymd_and_hms(2010, 5, 12, 12, 0, 0).unwrap())
        );
        let start = header.header_length.fixed().unwrap();
        assert_eq!(&data[start..], b"01AB");
        assert_eq!(header.get(keys::MO_MSG_NUM), Some(&TypedValue::Int(12)));
        assert_eq!(header.get(keys::LATITUDE), Some(&TypedValue::Float(38.9)));
        assert_eq!(header.get(keys::FAILURE_CODE), Some(&TypedValue::Char('G')));
    }

    #[test]
    fn test_failed_session_status() {
        let header = IridiumParser
            .parse_header(b"ID=1,TIME=10132120000,STAT=13 x")
            .unwrap();
        assert_eq!(header.get(keys::FAILURE_CODE), Some(&TypedValue::Char('?')));
    }

    #[test]
    fn test_missing_time() {
        let err = IridiumParser.parse_header(b"ID=1,STAT=0 x").unwrap_err();
        assert!(err.reason.contains("no TIME"));
    }
}
