//! GOES `yyDDDHHMMSS` time fields

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

/// Parse an 11-character `yyDDDHHMMSS` field.
///
/// Two-digit years below 70 are in the 2000s.
#[must_use]
pub fn parse_goes_time(field: &[u8]) -> Option<DateTime<Utc>> {
    if field.len() != 11 || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| -> u32 {
        field[range]
            .iter()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let yy = num(0..2);
    #[allow(clippy::cast_possible_wrap)]
    let year = if yy < 70 { 2000 + yy } else { 1900 + yy } as i32;
    let date = NaiveDate::from_yo_opt(year, num(2..5))?;
    let time = date.and_hms_opt(num(5..7), num(7..9), num(9..11))?;
    Some(time.and_utc())
}

/// Format a time as `yyDDDHHMMSS`
#[must_use]
pub fn format_goes_time(time: DateTime<Utc>) -> String {
    format!(
        "{:02}{:03}{:02}{:02}{:02}",
        time.year().rem_euclid(100),
        time.ordinal(),
        time.hour(),
        time.minute(),
        time.second()
    )
}
