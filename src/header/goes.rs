//! Fixed-width GOES/DOMSAT header

use std::ops::Range;

use super::{HeaderParser, HeaderType, ParseFailure, ParsedHeader, parse_goes_time};
use crate::message::{HeaderLength, keys};

/// Byte offsets of the fields in a fixed-width GOES header
///
/// # Default Layout (DOMSAT, 37 bytes)
///
/// ```text
/// 0        8            19 20  22  24 25 26   29 30  32     37
/// +--------+-------------+--+---+---+--+--+----+--+---+------+
/// | addr   | yyDDDHHMMSS |fc|sig|frq|mi|dq|chan|sc|upl|length|
/// +--------+-------------+--+---+---+--+--+----+--+---+------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoesLayout {
    /// Platform address
    pub address: Range<usize>,
    /// Message time
    pub time: Range<usize>,
    /// Failure code (one byte)
    pub failure_code: usize,
    /// Signal strength
    pub signal_strength: Range<usize>,
    /// Frequency offset (sign and digit)
    pub freq_offset: Range<usize>,
    /// Modulation index (one byte)
    pub mod_index: usize,
    /// Data quality (one byte)
    pub quality: usize,
    /// Channel
    pub channel: Range<usize>,
    /// Spacecraft (one byte)
    pub spacecraft: usize,
    /// Uplink carrier
    pub uplink_carrier: Range<usize>,
    /// Declared message length
    pub length: Range<usize>,
    /// Total header length
    pub header_len: usize,
}

impl Default for GoesLayout {
    fn default() -> Self {
        Self {
            address: 0..8,
            time: 8..19,
            failure_code: 19,
            signal_strength: 20..22,
            freq_offset: 22..24,
            mod_index: 24,
            quality: 25,
            channel: 26..29,
            spacecraft: 29,
            uplink_carrier: 30..32,
            length: 32..37,
            header_len: 37,
        }
    }
}

impl GoesLayout {
    /// Bytes needed to read every field
    #[must_use]
    pub fn required_len(&self) -> usize {
        [
            self.address.end,
            self.time.end,
            self.failure_code + 1,
            self.signal_strength.end,
            self.freq_offset.end,
            self.mod_index + 1,
            self.quality + 1,
            self.channel.end,
            self.spacecraft + 1,
            self.uplink_carrier.end,
            self.length.end,
            self.header_len,
        ]
        .into_iter()
        .max()
        .unwrap_or(self.header_len)
    }
}

/// Parser for the fixed-width GOES header
#[derive(Debug, Clone, Default)]
pub struct GoesParser {
    layout: GoesLayout,
}

impl GoesParser {
    /// Create a parser for the default DOMSAT layout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser for a custom layout
    #[must_use]
    pub const fn with_layout(layout: GoesLayout) -> Self {
        Self { layout }
    }

    /// Field layout
    #[must_use]
    pub const fn layout(&self) -> &GoesLayout {
        &self.layout
    }
}

fn text(data: &[u8], range: Range<usize>) -> &str {
    std::str::from_utf8(&data[range]).map_or("", str::trim)
}

impl HeaderParser for GoesParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::Goes
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        let layout = &self.layout;
        let needed = layout.required_len();
        if data.len() < needed {
            return Err(ParseFailure::new(
                format!("GOES header too short ({} bytes, need {needed})", data.len()),
                data,
            ));
        }

        let address = text(data, layout.address.clone());
        if address.is_empty() || !address.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseFailure::new("invalid DCP address", data));
        }

        let timestamp = parse_goes_time(&data[layout.time.clone()])
            .ok_or_else(|| ParseFailure::new("invalid GOES message time", data))?;

        let length = text(data, layout.length.clone());
        let length: i64 = length.parse().map_err(|_| {
            ParseFailure::new(format!("invalid message length field '{length}'"), data)
        })?;

        let mut header = ParsedHeader::new(
            address.to_ascii_uppercase(),
            Some(timestamp),
            HeaderLength::Fixed(layout.header_len),
        );
        header.set(keys::FAILURE_CODE, char::from(data[layout.failure_code]));
        header.set(keys::MESSAGE_LENGTH, length);
        header.set(keys::MOD_INDEX, char::from(data[layout.mod_index]));
        header.set(keys::QUALITY, char::from(data[layout.quality]));
        header.set(keys::SPACECRAFT, char::from(data[layout.spacecraft]));
        header.set(
            keys::UPLINK_CARRIER,
            text(data, layout.uplink_carrier.clone()),
        );

        if let Ok(signal) = text(data, layout.signal_strength.clone()).parse::<i64>() {
            header.set(keys::SIGNAL_STRENGTH, signal);
        }
        if let Ok(offset) = text(data, layout.freq_offset.clone()).parse::<i64>() {
            header.set(keys::FREQ_OFFSET, offset);
        }

        // Non-numeric channels are kept as text and rejected during resolution.
        let channel = text(data, layout.channel.clone());
        match channel.parse::<i64>() {
            Ok(chan) => header.set(keys::CHANNEL, chan),
            Err(_) => header.set(keys::CHANNEL, channel),
        }

        Ok(header)
    }
}

/// GOES header followed by a free-text description line
///
/// The description becomes the `SiteName` measurement and is counted as part
/// of the header.
#[derive(Debug, Clone, Default)]
pub struct GoesDescribedParser {
    goes: GoesParser,
}

impl GoesDescribedParser {
    /// Create a parser over the default DOMSAT layout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser over a custom GOES parser
    #[must_use]
    pub const fn with_goes(goes: GoesParser) -> Self {
        Self { goes }
    }
}

impl HeaderParser for GoesDescribedParser {
    fn header_type(&self) -> HeaderType {
        HeaderType::GoesDescribed
    }

    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure> {
        let mut header = self.goes.parse_header(data)?;
        let start = header.header_length.fixed().unwrap_or(0);

        let rest = &data[start..];
        let (line, end) = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => (&rest[..pos], start + pos + 1),
            None => (rest, data.len()),
        };

        let description = String::from_utf8_lossy(line);
        let description = description.trim();
        if !description.is_empty() {
            header.set(keys::SITE_NAME, description);
        }
        header.header_length = HeaderLength::Fixed(end);
        Ok(header)
    }
}
