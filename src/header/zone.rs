//! Time zone codes found in message headers

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const HOUR: i32 = 3600;

/// Zone codes and their UTC offsets in hours.
///
/// SHEF single letters are standard time; `S`/`D` suffixes select standard
/// or daylight time explicitly.
const ZONES: &[(&str, i32)] = &[
    ("Z", 0),
    ("UTC", 0),
    ("GMT", 0),
    ("N", -3),
    ("NS", -3),
    ("ND", -2),
    ("A", -4),
    ("AS", -4),
    ("AD", -3),
    ("AST", -4),
    ("ADT", -3),
    ("E", -5),
    ("ES", -5),
    ("ED", -4),
    ("EST", -5),
    ("EDT", -4),
    ("C", -6),
    ("CS", -6),
    ("CD", -5),
    ("CST", -6),
    ("CDT", -5),
    ("J", -6),
    ("M", -7),
    ("MS", -7),
    ("MD", -6),
    ("MST", -7),
    ("MDT", -6),
    ("P", -8),
    ("PS", -8),
    ("PD", -7),
    ("PST", -8),
    ("PDT", -7),
    ("Y", -9),
    ("YS", -9),
    ("YD", -8),
    ("AKST", -9),
    ("AKDT", -8),
    ("H", -10),
    ("HS", -10),
    ("HST", -10),
    ("L", -9),
    ("LS", -9),
    ("LD", -8),
    ("B", -11),
    ("BS", -11),
    ("BD", -10),
];

/// Result of looking up a zone code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneLookup {
    /// Code or numeric offset with a fixed distance from UTC
    Known(FixedOffset),
    /// IANA zone id such as `America/Chicago`, with daylight saving rules
    Named(Tz),
    /// Code was not recognized
    Unknown,
}

impl ZoneLookup {
    /// Interpret a local time in this zone, treating unknown codes as UTC.
    ///
    /// A time repeated by a daylight saving change resolves to its earlier
    /// instant; a time skipped by one has no instant.
    #[must_use]
    pub fn to_utc(self, local: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Known(offset) => offset
                .from_local_datetime(local)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
            Self::Named(tz) => tz
                .from_local_datetime(local)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
            Self::Unknown => Some(Utc.from_utc_datetime(local)),
        }
    }

    /// Check if times in this zone are UTC
    #[must_use]
    pub fn is_utc(self) -> bool {
        match self {
            Self::Known(offset) => offset.local_minus_utc() == 0,
            Self::Named(tz) => tz == Tz::UTC || tz == Tz::Etc__UTC,
            Self::Unknown => true,
        }
    }
}

/// Look up a zone code, a numeric `+HH:MM` / `-HHMM` offset or an IANA
/// zone id.
///
/// The header code table wins over IANA ids, so `EST` stays a fixed
/// offset.
#[must_use]
pub fn lookup_zone(code: &str) -> ZoneLookup {
    let code = code.trim();
    if let Some(offset) = parse_numeric(code) {
        return ZoneLookup::Known(offset);
    }

    let upper = code.to_ascii_uppercase();
    let upper = upper
        .strip_prefix("UTC")
        .filter(|rest| !rest.is_empty())
        .map_or(upper.as_str(), |rest| rest);
    if let Some(offset) = parse_numeric(upper) {
        return ZoneLookup::Known(offset);
    }

    if let Some(offset) = ZONES
        .iter()
        .find(|(name, _)| *name == upper)
        .and_then(|(_, hours)| FixedOffset::east_opt(hours * HOUR))
    {
        return ZoneLookup::Known(offset);
    }

    code.parse::<Tz>().map_or(ZoneLookup::Unknown, ZoneLookup::Named)
}

fn parse_numeric(code: &str) -> Option<FixedOffset> {
    let (sign, rest) = match code.as_bytes().first()? {
        b'+' => (1, &code[1..]),
        b'-' => (-1, &code[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * HOUR + minutes * 60))
}
