//! Acquisition loop
//!
//! [`AcquisitionLoop`] drives a [`MessageSource`] (normally a
//! [`SessionClient`](crate::session::SessionClient)), decodes each message
//! header through the [`HeaderParserRegistry`](crate::header::HeaderParserRegistry)
//! and binds the result to a platform from a [`PlatformDirectory`].
//!
//! A run of undecodable messages trips the breaker configured by
//! [`BadMessagePolicy`]; a failed session refuses to reopen until
//! [`AcquisitionConfig::timeout_sec_on_error`] has passed.

mod cancel;
mod config;
mod directory;
mod error;
mod resolver;
mod retrieve;
mod source;

pub use cancel::CancelToken;
pub use config::{AcquisitionConfig, BadMessagePolicy};
pub use directory::{
    ChannelMatcher, DirectoryError, InMemoryDirectory, LEGACY_RANDOM_CHANNEL_START,
    PlatformDirectory,
};
pub use error::{EndReason, RetrieveError, UnknownPlatform};
pub use resolver::{LookupKey, Resolver};
pub use retrieve::AcquisitionLoop;
pub use source::MessageSource;
