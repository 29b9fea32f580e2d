//! LDDS session layer
//!
//! [`SessionClient`] owns one TCP session to a relay server: it logs in,
//! uploads the selection ([`SearchCriteria`], [`NetworkList`]) and pulls
//! messages one at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ddsacq::session::{
//!     Credentials, EnvSecretResolver, Next, SearchCriteria, SessionClient, SessionConfig,
//! };
//!
//! let mut client = SessionClient::new(SessionConfig::new("lrgs.example.net", 16003));
//! client.connect()?;
//! client.authenticate(
//!     &Credentials::new("${env.DDS_USER}", "${env.DDS_PASS}"),
//!     &EnvSecretResolver::new(),
//! )?;
//!
//! let mut criteria = SearchCriteria::new();
//! criteria.since = Some("now - 1 hour".into());
//! client.send_filter(&criteria)?;
//! client.begin_streaming()?;
//!
//! while let Next::Message(msg) = client.next_message(Duration::from_secs(60))? {
//!     println!("{} bytes", msg.data().len());
//! }
//! client.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod auth;
mod client;
mod connection;
mod criteria;
mod error;
mod netlist;
mod state;

pub use auth::{
    Credentials, EnvSecretResolver, Secret, SecretResolver, authenticator, is_reference,
    password_hash,
};
pub use client::{Next, SessionClient, SessionConfig};
pub use connection::Connection;
pub use criteria::{ChannelToken, FilterMode, MAX_EXPLICIT_ADDRESSES, SearchCriteria, Spacecraft};
pub use error::{ConnectionError, CredentialError, SessionError};
pub use netlist::{NetlistError, NetworkList, NetworkListItem};
pub use state::SessionState;
