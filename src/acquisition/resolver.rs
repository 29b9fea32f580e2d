//! Binding decoded messages to platforms

use std::sync::Arc;

use tracing::warn;

use super::{PlatformDirectory, UnknownPlatform};
use crate::header::{HeaderType, ParseFailure};
use crate::message::{RawMessage, keys};

/// Address and channel a message is looked up by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    /// Medium id, upper-cased
    pub address: String,
    /// GOES channel; `None` when the header has none
    pub channel: Option<u32>,
}

impl LookupKey {
    /// Derive the key from a decoded message.
    ///
    /// The address is the upper-cased `DcpAddress`, except for messages
    /// decoded by the EDL parser, which are looked up by `Station`. A
    /// non-numeric channel is a parse failure.
    pub fn from_message(msg: &RawMessage) -> Result<Self, ParseFailure> {
        let mut address = msg
            .measurement(keys::DCP_ADDRESS)
            .and_then(|v| v.as_str())
            .or(msg.medium_id())
            .unwrap_or_default()
            .to_ascii_uppercase();

        if msg.header_type() == Some(HeaderType::Edl) {
            if let Some(station) = msg.measurement(keys::STATION).and_then(|v| v.as_str()) {
                address = station.to_string();
            }
        }

        let channel = match msg.measurement(keys::CHANNEL) {
            None => None,
            Some(value) => Some(
                value
                    .as_i64()
                    .and_then(|c| u32::try_from(c).ok())
                    .ok_or_else(|| {
                        ParseFailure::new(
                            "non-numeric channel in DCP message header",
                            msg.payload(),
                        )
                    })?,
            ),
        };

        Ok(Self { address, channel })
    }
}

/// Looks messages up in the platform directory
#[derive(Clone)]
pub struct Resolver {
    directory: Option<Arc<dyn PlatformDirectory>>,
    legacy_ranges: bool,
    allow_null_platform: bool,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("directory", &self.directory.is_some())
            .field("legacy_ranges", &self.legacy_ranges)
            .field("allow_null_platform", &self.allow_null_platform)
            .finish()
    }
}

impl Resolver {
    /// Create a resolver
    pub fn new(
        directory: Option<Arc<dyn PlatformDirectory>>,
        legacy_ranges: bool,
        allow_null_platform: bool,
    ) -> Self {
        Self {
            directory,
            legacy_ranges,
            allow_null_platform,
        }
    }

    /// Bind `msg` to its platform and transport medium.
    ///
    /// Directory failures are logged and leave the message unbound.
    pub fn resolve(&self, msg: &mut RawMessage, key: &LookupKey) -> Result<(), UnknownPlatform> {
        let medium_type = msg
            .header_type()
            .map_or(crate::message::medium_type::GOES, HeaderType::medium_type);

        let lookup = match &self.directory {
            Some(dir) => dir.find_platform(medium_type, &key.address, msg.timestamp()),
            None => Ok(None),
        };

        match lookup {
            Ok(Some(platform)) => {
                let medium = self.directory.as_ref().and_then(|dir| {
                    dir.resolve_transport_medium(
                        &platform,
                        &key.address,
                        key.channel,
                        self.legacy_ranges,
                    )
                });
                if medium.is_none() {
                    warn!(
                        addr = %key.address,
                        chan = ?key.channel,
                        "cannot resolve transport medium"
                    );
                }
                msg.set_platform(platform, medium);
                Ok(())
            }
            Ok(None) if self.allow_null_platform => Ok(()),
            Ok(None) => Err(UnknownPlatform {
                address: key.address.clone(),
                channel: if msg.flags().is_goes() {
                    key.channel
                } else {
                    None
                },
                medium_type: medium_type.to_string(),
                fragment: crate::header::fragment(msg.payload()),
            }),
            Err(err) => {
                warn!(
                    error = %err,
                    fragment = %crate::header::fragment(msg.payload()),
                    "cannot read platform record"
                );
                Ok(())
            }
        }
    }
}
