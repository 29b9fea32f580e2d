//! LDDS protocol core implementation
//!
//! This module provides the wire format, message identifiers, and codec for
//! the LRGS DCP Data Service (LDDS) session protocol.

mod codec;
mod dcp;
mod error;
mod header;
mod message;
mod server_error;
mod types;

pub use codec::{decode, encode, read_frame};
pub use dcp::{DCP_MSG_MIN_LENGTH, DcpMessage, SEQ_FILE_NAME_LEN};
pub use error::{Error, Result};
pub use header::FrameHeader;
pub use message::Frame;
pub use server_error::{ServerError, c_string, code};
pub use types::{MessageFlags, MessageId};

/// LDDS sync pattern: "FAF0" in ASCII
pub const SYNC: &[u8; 4] = b"FAF0";

/// Header size in bytes
pub const HEADER_SIZE: usize = 10;

/// Maximum body size (five decimal digits)
pub const MAX_BODY_SIZE: usize = 99_999;

/// Width of the name header on search-criteria uploads
pub const CRITERIA_NAME_LEN: usize = 50;

/// Width of the name header on network-list uploads
pub const NETLIST_NAME_LEN: usize = 64;

/// Protocol version announced in hello requests
pub const PROTOCOL_VERSION: u32 = 14;

/// Default LDDS port
pub const DEFAULT_PORT: u16 = 16003;
