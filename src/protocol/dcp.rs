//! DCP message as delivered by the relay server

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::server_error::c_string;
use super::{Error, MessageFlags, MessageId, Result};

/// Width of the NUL-padded sequence file name preceding each DCP message
pub const SEQ_FILE_NAME_LEN: usize = 40;

/// Minimum DCP message length (one DOMSAT header)
pub const DCP_MSG_MIN_LENGTH: usize = 37;

/// Offset of the failure code in a DOMSAT header
const FAILURE_CODE_OFFSET: usize = 19;

/// A single message retrieved from the server
///
/// Carrier and DOMSAT times are only known for servers that report them;
/// they stay `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcpMessage {
    data: Bytes,
    flags: MessageFlags,
    seq_file_name: String,
    /// Transmission baud rate
    pub baud: Option<u32>,
    /// Carrier acquisition time
    pub carrier_start: Option<DateTime<Utc>>,
    /// Carrier loss time
    pub carrier_stop: Option<DateTime<Utc>>,
    /// Time the message was relayed over DOMSAT
    pub domsat_time: Option<DateTime<Utc>>,
}

impl DcpMessage {
    /// Create from message data and flags
    pub fn new(data: impl Into<Bytes>, flags: MessageFlags) -> Self {
        Self {
            data: data.into(),
            flags,
            seq_file_name: String::new(),
            baud: None,
            carrier_start: None,
            carrier_stop: None,
            domsat_time: None,
        }
    }

    /// Build from the body of a Dcp response
    ///
    /// The body starts with the 40-byte sequence file name. Messages from the
    /// server are flagged present, DDS-sourced and unsequenced; the message
    /// type is taken from the data itself.
    pub fn from_dcp_body(body: &Bytes) -> Result<Self> {
        if body.len() < SEQ_FILE_NAME_LEN + DCP_MSG_MIN_LENGTH {
            return Err(Error::MalformedResponse {
                request: MessageId::Dcp,
                reason: format!("too-short DCP message response ({} bytes)", body.len()),
            });
        }

        let data = body.slice(SEQ_FILE_NAME_LEN..);
        let flags = MessageFlags::new()
            .with(MessageFlags::MSG_PRESENT)
            .with(MessageFlags::SRC_DDS)
            .with(MessageFlags::MSG_NO_SEQNUM)
            .with_type(infer_type(&data));

        let mut msg = Self::new(data, flags);
        msg.seq_file_name = c_string(&body[..SEQ_FILE_NAME_LEN]);
        Ok(msg)
    }

    /// Message data (header and payload)
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Transport flags
    #[must_use]
    pub const fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// Server-side sequence file name
    #[must_use]
    pub fn seq_file_name(&self) -> &str {
        &self.seq_file_name
    }

    /// Transmission failure code
    ///
    /// GOES messages carry it in the header; network DCP and Iridium
    /// messages are always good.
    #[must_use]
    pub fn failure_code(&self) -> char {
        if self.flags.is_goes() {
            self.data
                .get(FAILURE_CODE_OFFSET)
                .map_or('?', |&b| char::from(b))
        } else {
            'G'
        }
    }

    /// Check if this is a DAPS status message rather than DCP data
    #[must_use]
    pub fn is_daps_status(&self) -> bool {
        !matches!(self.failure_code(), 'G' | '?')
    }
}

fn infer_type(data: &[u8]) -> u32 {
    if data.starts_with(b"ID=") {
        MessageFlags::TYPE_IRIDIUM
    } else if data.starts_with(b"//") {
        MessageFlags::TYPE_NET_DCP
    } else {
        MessageFlags::TYPE_GOES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str, data: &[u8]) -> Bytes {
        let mut body = name.as_bytes().to_vec();
        body.resize(SEQ_FILE_NAME_LEN, 0);
        body.extend_from_slice(data);
        Bytes::from(body)
    }

    #[test]
    fn test_goes_body() {
        let msg = DcpMessage::from_dcp_body(&body(
            "20101321200",
            b"CE31D03010132120000G44+0NN118EXE00012hello",
        ))
        .unwrap();

        assert_eq!(msg.seq_file_name(), "20101321200");
        assert!(msg.flags().is_goes());
        assert!(msg.flags().has(MessageFlags::SRC_DDS));
        assert_eq!(msg.failure_code(), 'G');
        assert!(!msg.is_daps_status());
        assert!(msg.data().ends_with(b"hello"));
    }

    #[test]
    fn test_daps_status_message() {
        let msg = DcpMessage::from_dcp_body(&body(
            "x",
            b"CE31D03010132120000M44+0NN118EXE00000",
        ))
        .unwrap();
        assert!(msg.is_daps_status());
    }

    #[test]
    fn test_type_from_data() {
        let iridium = DcpMessage::from_dcp_body(&body(
            "x",
            b"ID=300234010123450,TIME=10132120000,STAT=1 data",
        ))
        .unwrap();
        assert!(iridium.flags().is_iridium());

        let edl = DcpMessage::from_dcp_body(&body("x", b"//STATION ABCD1\n//DEVICE END TIME x\n"))
            .unwrap();
        assert!(edl.flags().is_net_dcp());
        assert_eq!(edl.failure_code(), 'G');
    }

    #[test]
    fn test_too_short() {
        let result = DcpMessage::from_dcp_body(&body("x", b"CE31D030"));
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }
}
