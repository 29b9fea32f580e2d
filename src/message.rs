//! Normalized message record and measurement model

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::header::{HeaderType, ParseFailure, ParsedHeader};
use crate::protocol::MessageFlags;

/// Measurement names recorded by header parsers
pub mod keys {
    /// Platform address / device id
    pub const DCP_ADDRESS: &str = "DcpAddress";
    /// Message time
    pub const MESSAGE_TIME: &str = "MessageTime";
    /// Transmission failure code
    pub const FAILURE_CODE: &str = "FailureCode";
    /// Signal strength (dBm)
    pub const SIGNAL_STRENGTH: &str = "SignalStrength";
    /// Frequency offset (in 50 Hz increments)
    pub const FREQ_OFFSET: &str = "FrequencyOffset";
    /// Modulation index
    pub const MOD_INDEX: &str = "ModulationIndex";
    /// Data quality
    pub const QUALITY: &str = "DataQuality";
    /// GOES channel
    pub const CHANNEL: &str = "Channel";
    /// GOES spacecraft (E or W)
    pub const SPACECRAFT: &str = "Spacecraft";
    /// Uplink carrier status
    pub const UPLINK_CARRIER: &str = "UplinkCarrier";
    /// Message length declared in the header
    pub const MESSAGE_LENGTH: &str = "Length";
    /// Transmission baud rate
    pub const BAUD: &str = "Baud";
    /// Carrier acquisition time
    pub const CARRIER_START: &str = "CarrierStart";
    /// Carrier loss time
    pub const CARRIER_STOP: &str = "CarrierStop";
    /// DOMSAT relay time
    pub const DOMSAT_TIME: &str = "DomsatTime";
    /// Transport flags of the originating message
    pub const DCP_MSG_FLAGS: &str = "DcpMsgFlags";
    /// Station name from an EDL header
    pub const STATION: &str = "Station";
    /// Site name or description line
    pub const SITE_NAME: &str = "SiteName";
    /// Time zone in which the header time was expressed
    pub const TIME_ZONE: &str = "TimeZone";
    /// EDL device end time
    pub const DEVICE_END_TIME: &str = "DeviceEndTime";
    /// EDL begin time
    pub const BEGIN_TIME: &str = "BeginTime";
    /// EDL source
    pub const SOURCE: &str = "Source";
    /// SHEF record type token (e.g. `.E`)
    pub const RECORD_TYPE: &str = "RecordType";
    /// SHEF month/day when the year is supplied elsewhere
    pub const MONTH_DAY: &str = "MonthDay";
    /// Iridium session status
    pub const SESSION_STATUS: &str = "SessionStatus";
    /// Iridium mobile-originated message number
    pub const MO_MSG_NUM: &str = "MoMsgNum";
    /// Iridium mobile-terminated message number
    pub const MT_MSG_NUM: &str = "MtMsgNum";
    /// Iridium call data record reference
    pub const CDR_REFERENCE: &str = "CdrReference";
    /// Iridium latitude
    pub const LATITUDE: &str = "Latitude";
    /// Iridium longitude
    pub const LONGITUDE: &str = "Longitude";
    /// Iridium CEP radius
    pub const CEP_RADIUS: &str = "CepRadius";
}

/// Medium type names used for platform lookups
pub mod medium_type {
    /// GOES, either self-timed or random
    pub const GOES: &str = "goes";
    /// GOES self-timed
    pub const GOES_SELF_TIMED: &str = "goes-self-timed";
    /// GOES random
    pub const GOES_RANDOM: &str = "goes-random";
    /// Iridium SBD
    pub const IRIDIUM: &str = "iridium";
    /// Electronic data logger (network DCP)
    pub const EDL: &str = "edl";
    /// SHEF text
    pub const SHEF: &str = "shef";
    /// Delimited text
    pub const DATA_LOGGER: &str = "data-logger";

    /// Check whether `candidate` satisfies a lookup for `wanted`.
    ///
    /// A lookup for plain GOES matches either GOES variant.
    #[must_use]
    pub fn matches(wanted: &str, candidate: &str) -> bool {
        if wanted.eq_ignore_ascii_case(candidate) {
            return true;
        }
        let is_goes = |t: &str| {
            t.eq_ignore_ascii_case(GOES)
                || t.eq_ignore_ascii_case(GOES_SELF_TIMED)
                || t.eq_ignore_ascii_case(GOES_RANDOM)
        };
        wanted.eq_ignore_ascii_case(GOES) && is_goes(candidate)
    }
}

/// Where application data begins within the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderLength {
    /// Byte offset of the first data byte
    Fixed(usize),
    /// Framing is intrinsically variable-length
    #[default]
    Variable,
}

impl HeaderLength {
    /// Byte offset, if fixed
    #[must_use]
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(n),
            Self::Variable => None,
        }
    }
}

/// A typed measurement value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypedValue {
    /// Text
    Str(String),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Point in time
    Instant(DateTime<Utc>),
    /// Single character (failure codes, spacecraft)
    Char(char),
}

impl TypedValue {
    /// Text value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; numeric text is parsed
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point value
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Time value
    #[must_use]
    pub const fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Instant(t) => Some(*t),
            _ => None,
        }
    }

    /// Character value
    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(c) => Some(*c),
            Self::Str(s) if s.chars().count() == 1 => s.chars().next(),
            _ => None,
        }
    }
}

impl PartialOrd for TypedValue {
    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Instant(a), Self::Instant(b)) => Some(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Char(a), Self::Char(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Instant(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%SZ")),
            Self::Char(c) => write!(f, "{c}"),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<char> for TypedValue {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Instant(value)
    }
}

/// Self-timed or random GOES assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MediumKind {
    /// Scheduled transmissions
    SelfTimed,
    /// Event-driven transmissions
    Random,
    /// Not a GOES assignment
    Other,
}

/// Transport medium of a platform (how its messages arrive)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportMediumRef {
    /// Medium type name (see [`medium_type`])
    pub medium_type: String,
    /// Address / device id on this medium
    pub medium_id: String,
    /// GOES channel, if assigned
    pub channel: Option<u32>,
}

impl TransportMediumRef {
    /// Create a medium without a channel
    pub fn new(medium_type: impl Into<String>, medium_id: impl Into<String>) -> Self {
        Self {
            medium_type: medium_type.into(),
            medium_id: medium_id.into(),
            channel: None,
        }
    }

    /// Set the channel
    #[must_use]
    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Self-timed / random classification
    #[must_use]
    pub fn kind(&self) -> MediumKind {
        if self.medium_type.eq_ignore_ascii_case(medium_type::GOES_SELF_TIMED) {
            MediumKind::SelfTimed
        } else if self.medium_type.eq_ignore_ascii_case(medium_type::GOES_RANDOM) {
            MediumKind::Random
        } else {
            MediumKind::Other
        }
    }
}

/// Reference to a monitoring platform in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformRef {
    /// Platform name
    pub name: String,
    /// Transport media through which the platform reports
    pub transport_media: Vec<TransportMediumRef>,
    /// Time after which this platform record is superseded
    pub expires: Option<DateTime<Utc>>,
}

impl PlatformRef {
    /// Create a platform with no transport media
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport_media: Vec::new(),
            expires: None,
        }
    }

    /// Add a transport medium
    #[must_use]
    pub fn with_medium(mut self, medium: TransportMediumRef) -> Self {
        self.transport_media.push(medium);
        self
    }

    /// Check whether this record is valid at `at`
    #[must_use]
    pub fn is_current(&self, at: Option<DateTime<Utc>>) -> bool {
        match (self.expires, at) {
            (Some(expires), Some(at)) => at < expires,
            _ => true,
        }
    }
}

/// A retrieved message and the measurements decoded from its header
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMessage {
    payload: Bytes,
    header_length: HeaderLength,
    medium_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    measurements: HashMap<String, TypedValue>,
    source_name: String,
    platform: Option<PlatformRef>,
    transport_medium: Option<TransportMediumRef>,
    header_type: Option<HeaderType>,
    fallback_from: Option<HeaderType>,
    flags: MessageFlags,
}

impl RawMessage {
    /// Wrap raw bytes; nothing is decoded yet
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            header_length: HeaderLength::Variable,
            medium_id: None,
            timestamp: None,
            measurements: HashMap::new(),
            source_name: String::new(),
            platform: None,
            transport_medium: None,
            header_type: None,
            fallback_from: None,
            flags: MessageFlags::default(),
        }
    }

    /// Set the acquisition source name
    #[must_use]
    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Set the transport flags
    #[must_use]
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Raw bytes as received
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Application data following the header
    ///
    /// Variable-length framing yields the whole payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self.header_length {
            HeaderLength::Variable => &self.payload,
            HeaderLength::Fixed(n) => &self.payload[n.min(self.payload.len())..],
        }
    }

    /// Header length
    #[must_use]
    pub const fn header_length(&self) -> HeaderLength {
        self.header_length
    }

    /// Medium id (platform address)
    #[must_use]
    pub fn medium_id(&self) -> Option<&str> {
        self.medium_id.as_deref()
    }

    /// Message timestamp
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Look up a measurement
    #[must_use]
    pub fn measurement(&self, name: &str) -> Option<&TypedValue> {
        self.measurements.get(name)
    }

    /// All measurements
    #[must_use]
    pub fn measurements(&self) -> &HashMap<String, TypedValue> {
        &self.measurements
    }

    /// Record a measurement, replacing any previous value
    pub fn set_measurement(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) {
        self.measurements.insert(name.into(), value.into());
    }

    /// Acquisition source name
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Resolved platform
    #[must_use]
    pub fn platform(&self) -> Option<&PlatformRef> {
        self.platform.as_ref()
    }

    /// Resolved transport medium
    #[must_use]
    pub fn transport_medium(&self) -> Option<&TransportMediumRef> {
        self.transport_medium.as_ref()
    }

    /// Bind the message to a platform
    pub fn set_platform(&mut self, platform: PlatformRef, medium: Option<TransportMediumRef>) {
        self.platform = Some(platform);
        self.transport_medium = medium;
    }

    /// Parser that decoded the header
    #[must_use]
    pub const fn header_type(&self) -> Option<HeaderType> {
        self.header_type
    }

    /// Parser that failed before the fallback succeeded
    #[must_use]
    pub const fn fallback_from(&self) -> Option<HeaderType> {
        self.fallback_from
    }

    pub(crate) fn set_fallback_from(&mut self, failed: HeaderType) {
        self.fallback_from = Some(failed);
    }

    /// Transport flags
    #[must_use]
    pub const fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// Merge a decoded header into this message.
    ///
    /// A fixed header length past the end of the payload is rejected.
    pub fn apply_header(
        &mut self,
        header_type: HeaderType,
        header: ParsedHeader,
    ) -> Result<(), ParseFailure> {
        if let HeaderLength::Fixed(n) = header.header_length {
            if n > self.payload.len() {
                return Err(ParseFailure::new(
                    format!(
                        "header length {n} exceeds message length {}",
                        self.payload.len()
                    ),
                    &self.payload,
                ));
            }
        }

        self.measurements.extend(header.measurements);
        self.measurements
            .entry(keys::FAILURE_CODE.to_string())
            .or_insert(TypedValue::Char('G'));
        self.measurements.insert(
            keys::DCP_ADDRESS.to_string(),
            TypedValue::Str(header.medium_id.clone()),
        );
        if let Some(ts) = header.timestamp {
            self.measurements
                .insert(keys::MESSAGE_TIME.to_string(), TypedValue::Instant(ts));
        }

        self.medium_id = Some(header.medium_id);
        self.timestamp = header.timestamp;
        self.header_length = header.header_length;
        self.header_type = Some(header_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parsed(id: &str, len: HeaderLength) -> ParsedHeader {
        ParsedHeader::new(id, None, len)
    }

    #[test]
    fn test_apply_header_sets_required_fields() {
        let mut msg = RawMessage::new(&b"ABC123 payload"[..]);
        msg.apply_header(HeaderType::Goes, parsed("ABC123", HeaderLength::Fixed(7)))
            .unwrap();

        assert_eq!(msg.medium_id(), Some("ABC123"));
        assert_eq!(msg.data(), b"payload");
        assert_eq!(
            msg.measurement(keys::FAILURE_CODE),
            Some(&TypedValue::Char('G'))
        );
        assert_eq!(
            msg.measurement(keys::DCP_ADDRESS).and_then(TypedValue::as_str),
            Some("ABC123")
        );
        assert_eq!(msg.header_type(), Some(HeaderType::Goes));
    }

    #[test]
    fn test_header_past_payload_rejected() {
        let mut msg = RawMessage::new(&b"short"[..]);
        let err = msg
            .apply_header(HeaderType::Goes, parsed("X", HeaderLength::Fixed(37)))
            .unwrap_err();
        assert!(err.reason.contains("exceeds"));
        assert_eq!(msg.medium_id(), None);
    }

    #[test]
    fn test_typed_value_comparisons() {
        assert!(TypedValue::Int(3) < TypedValue::Float(3.5));
        assert!(TypedValue::Float(-2.8) < TypedValue::Int(0));

        let a = Utc.with_ymd_and_hms(2010, 5, 12, 6, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2010, 5, 12, 6, 0, 1).unwrap();
        assert!(TypedValue::Instant(a) < TypedValue::Instant(b));

        assert_eq!(TypedValue::Str("x".into()).partial_cmp(&TypedValue::Int(1)), None);
        assert_eq!(TypedValue::Str(" 118".into()).as_i64(), Some(118));
    }

    #[test]
    fn test_goes_medium_type_matching() {
        assert!(medium_type::matches("goes", "goes-self-timed"));
        assert!(medium_type::matches("GOES", "goes-random"));
        assert!(!medium_type::matches("goes-random", "goes-self-timed"));
        assert!(!medium_type::matches("iridium", "goes"));
    }
}
