//! Header parsers
//!
//! Each source type frames its messages differently. A [`HeaderParser`]
//! extracts the medium id, timestamp, header length and any other
//! measurements from the raw bytes; [`HeaderParserRegistry`] picks the parser
//! from the message's transport flags.

mod delimited;
mod edl;
mod error;
mod goes;
mod iridium;
mod registry;
mod shef;
mod time;
mod zone;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::message::{HeaderLength, RawMessage, TypedValue, medium_type};

pub use delimited::{DatePattern, DelimitedConfig, DelimitedParser};
pub use edl::EdlParser;
pub use error::{FRAGMENT_LEN, ParseFailure, fragment};
pub use goes::{GoesDescribedParser, GoesLayout, GoesParser};
pub use iridium::IridiumParser;
pub use registry::HeaderParserRegistry;
pub use shef::{ShefDate, ShefParser};
pub use time::{format_goes_time, parse_goes_time};
pub use zone::{ZoneLookup, lookup_zone};

/// Parser variant that decoded a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderType {
    /// Fixed-width DOMSAT header
    Goes,
    /// DOMSAT header followed by a description line
    GoesDescribed,
    /// Electronic data logger (network DCP)
    Edl,
    /// Iridium SBD
    Iridium,
    /// SHEF text
    Shef,
    /// Delimited columns
    Delimited,
}

impl HeaderType {
    /// Medium type used for platform lookups
    #[must_use]
    pub const fn medium_type(self) -> &'static str {
        match self {
            Self::Goes | Self::GoesDescribed => medium_type::GOES,
            Self::Edl => medium_type::EDL,
            Self::Iridium => medium_type::IRIDIUM,
            Self::Shef => medium_type::SHEF,
            Self::Delimited => medium_type::DATA_LOGGER,
        }
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Goes => "goes",
            Self::GoesDescribed => "goes-described",
            Self::Edl => "edl",
            Self::Iridium => "iridium",
            Self::Shef => "shef",
            Self::Delimited => "delimited",
        };
        f.write_str(name)
    }
}

/// Result of decoding a header
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHeader {
    /// Medium id (platform address)
    pub medium_id: String,
    /// Message time, if it could be determined
    pub timestamp: Option<DateTime<Utc>>,
    /// Where application data begins
    pub header_length: HeaderLength,
    /// Additional measurements
    pub measurements: HashMap<String, TypedValue>,
}

impl ParsedHeader {
    /// Create a header with no extra measurements
    pub fn new(
        medium_id: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        header_length: HeaderLength,
    ) -> Self {
        Self {
            medium_id: medium_id.into(),
            timestamp,
            header_length,
            measurements: HashMap::new(),
        }
    }

    /// Record a measurement
    pub fn set(&mut self, name: &str, value: impl Into<TypedValue>) {
        self.measurements.insert(name.to_string(), value.into());
    }

    /// Look up a measurement
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.measurements.get(name)
    }
}

/// Decodes the header of one source type
///
/// Implementations are pure: the same bytes and configuration always give
/// the same result, and nothing blocks on I/O.
pub trait HeaderParser: Send + Sync + fmt::Debug {
    /// Variant implemented by this parser
    fn header_type(&self) -> HeaderType;

    /// Medium type used for platform lookups
    fn medium_type(&self) -> &'static str {
        self.header_type().medium_type()
    }

    /// Decode the header at the start of `data`
    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader, ParseFailure>;

    /// Decode the header of `msg` and merge the result into it
    fn parse(&self, mut msg: RawMessage) -> Result<RawMessage, ParseFailure> {
        let header = self.parse_header(msg.payload())?;
        msg.apply_header(self.header_type(), header)?;
        Ok(msg)
    }
}
