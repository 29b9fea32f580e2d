//! LDDS message identifiers and DCP message transport flags

use std::fmt;

/// LDDS message identifiers (one ASCII character on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    /// Anonymous hello
    Hello = b'a',
    /// End of session
    Goodbye = b'b',
    /// Server status request
    Status = b'c',
    /// Start of real-time retrieval (legacy)
    Start = b'd',
    /// Abort the outstanding request
    Stop = b'e',
    /// Single DCP message
    Dcp = b'f',
    /// Search criteria upload
    Criteria = b'g',
    /// Network list download
    GetNetlist = b'h',
    /// Network list upload
    PutNetlist = b'i',
    /// Authenticated hello
    AuthHello = b'm',
    /// Block of DCP messages
    DcpBlock = b'n',
}

impl MessageId {
    /// Convert from the wire character
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'a' => Some(Self::Hello),
            b'b' => Some(Self::Goodbye),
            b'c' => Some(Self::Status),
            b'd' => Some(Self::Start),
            b'e' => Some(Self::Stop),
            b'f' => Some(Self::Dcp),
            b'g' => Some(Self::Criteria),
            b'h' => Some(Self::GetNetlist),
            b'i' => Some(Self::PutNetlist),
            b'm' => Some(Self::AuthHello),
            b'n' => Some(Self::DcpBlock),
            _ => None,
        }
    }

    /// Convert to the wire character
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hello => "hello",
            Self::Goodbye => "goodbye",
            Self::Status => "status",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Dcp => "dcp",
            Self::Criteria => "criteria",
            Self::GetNetlist => "get-netlist",
            Self::PutNetlist => "put-netlist",
            Self::AuthHello => "auth-hello",
            Self::DcpBlock => "dcp-block",
        };
        write!(f, "{name} ('{}')", char::from(self.as_u8()))
    }
}

/// Transport flags carried with each DCP message
///
/// The message-type field is a small enumeration packed into bits 8..12;
/// only one type is ever set, so the `is_*` predicates are mutually
/// exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageFlags(u32);

impl MessageFlags {
    /// Message data is present
    pub const MSG_PRESENT: u32 = 1 << 0;
    /// Message arrived over DDS from another server
    pub const SRC_DDS: u32 = 1 << 1;
    /// Server did not assign a sequence number
    pub const MSG_NO_SEQNUM: u32 = 1 << 2;

    /// Mask of the message-type field
    pub const TYPE_MASK: u32 = 0x0F << 8;
    /// GOES DCP (self-timed or random)
    pub const TYPE_GOES: u32 = 0;
    /// GOES received through a DAMS-NT demodulator
    pub const TYPE_DAMS_NT: u32 = 1 << 8;
    /// Iridium short-burst data
    pub const TYPE_IRIDIUM: u32 = 2 << 8;
    /// Network DCP polled over IP
    pub const TYPE_NET_DCP: u32 = 3 << 8;

    /// Create empty flags (GOES, no bits set)
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create from raw bits
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Set a flag
    #[must_use]
    pub const fn with(mut self, flag: u32) -> Self {
        self.0 |= flag;
        self
    }

    /// Replace the message-type field
    #[must_use]
    pub const fn with_type(mut self, msg_type: u32) -> Self {
        self.0 = (self.0 & !Self::TYPE_MASK) | (msg_type & Self::TYPE_MASK);
        self
    }

    /// Check if flag is set
    #[must_use]
    pub const fn has(self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }

    const fn msg_type(self) -> u32 {
        self.0 & Self::TYPE_MASK
    }

    /// Check if this is an Iridium message
    #[must_use]
    pub const fn is_iridium(self) -> bool {
        self.msg_type() == Self::TYPE_IRIDIUM
    }

    /// Check if this is a GOES message received through DAMS-NT
    #[must_use]
    pub const fn is_dams_nt(self) -> bool {
        self.msg_type() == Self::TYPE_DAMS_NT
    }

    /// Check if this is a network DCP message
    #[must_use]
    pub const fn is_net_dcp(self) -> bool {
        self.msg_type() == Self::TYPE_NET_DCP
    }

    /// Check if this message carries a DOMSAT-style GOES header
    #[must_use]
    pub const fn is_goes(self) -> bool {
        matches!(self.msg_type(), Self::TYPE_GOES | Self::TYPE_DAMS_NT)
    }
}

impl fmt::Display for MessageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_iridium() {
            "IRIDIUM"
        } else if self.is_dams_nt() {
            "DAMS-NT"
        } else if self.is_net_dcp() {
            "NETDCP"
        } else {
            "GOES"
        };
        write!(f, "{kind} (0x{:x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_roundtrip() {
        let ids = [
            MessageId::Hello,
            MessageId::AuthHello,
            MessageId::Dcp,
            MessageId::Stop,
            MessageId::PutNetlist,
        ];

        for id in ids {
            let byte = id.as_u8();
            let decoded = MessageId::from_u8(byte).unwrap();
            assert_eq!(id, decoded);
        }
        assert_eq!(MessageId::from_u8(b'z'), None);
    }

    #[test]
    fn test_message_types_are_exclusive() {
        let flags = MessageFlags::new()
            .with(MessageFlags::SRC_DDS)
            .with_type(MessageFlags::TYPE_NET_DCP);

        assert!(flags.is_net_dcp());
        assert!(!flags.is_iridium());
        assert!(!flags.is_goes());
        assert!(flags.has(MessageFlags::SRC_DDS));

        let flags = flags.with_type(MessageFlags::TYPE_IRIDIUM);
        assert!(flags.is_iridium());
        assert!(!flags.is_net_dcp());
    }

    #[test]
    fn test_default_flags_are_goes() {
        assert!(MessageFlags::default().is_goes());
        assert!(MessageFlags::new().with_type(MessageFlags::TYPE_DAMS_NT).is_goes());
    }
}
