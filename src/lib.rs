//! ddsacq - DCP message acquisition from LRGS DDS servers
//!
//! This library pulls telemetry messages (GOES/DCP, Iridium, network DCP)
//! from a relay server over the LDDS session protocol, decodes their
//! headers and binds each message to a monitoring platform.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ddsacq::acquisition::{AcquisitionConfig, AcquisitionLoop, InMemoryDirectory, RetrieveError};
//! use ddsacq::config::Properties;
//! use ddsacq::session::{SessionClient, SessionConfig};
//!
//! let props: Properties = [
//!     ("host", "lrgs.example.net"),
//!     ("username", "${env.DDS_USER}"),
//!     ("password", "${env.DDS_PASS}"),
//!     ("since", "now - 1 hour"),
//!     ("allowNullPlatform", "true"),
//! ]
//! .into_iter()
//! .collect();
//! let config = AcquisitionConfig::from_properties(&props)?;
//!
//! let client = SessionClient::new(config.session.clone());
//! let mut acq = AcquisitionLoop::new(client, config)
//!     .with_directory(Arc::new(InMemoryDirectory::new()));
//! acq.open()?;
//!
//! loop {
//!     match acq.retrieve() {
//!         Ok(msg) => println!("{:?} {:?}", msg.medium_id(), msg.timestamp()),
//!         Err(RetrieveError::Blocked { .. }) => continue,
//!         Err(_) => break,
//!     }
//! }
//! acq.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Layout
//!
//! - [`protocol`] - LDDS frames, message ids and server error codes
//! - [`session`] - the session client, search criteria and network lists
//! - [`header`] - header parsers and the flag-driven registry
//! - [`message`] - the decoded message record
//! - [`acquisition`] - the retrieval loop, breaker and platform resolution
//! - [`config`] - flat property maps

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod acquisition;
pub mod config;
pub mod header;
pub mod message;
pub mod protocol;
pub mod session;

pub use acquisition::{AcquisitionConfig, AcquisitionLoop, RetrieveError};
pub use header::{HeaderParser, HeaderParserRegistry, HeaderType, ParseFailure};
pub use message::{HeaderLength, RawMessage, TypedValue};
pub use protocol::{DEFAULT_PORT, Error, Frame, MessageId, Result};
pub use session::{SessionClient, SessionConfig, SessionState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
