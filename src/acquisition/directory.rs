//! Platform directory seam

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::message::{MediumKind, PlatformRef, TransportMediumRef, medium_type};

/// Channels below this are self-timed under the legacy channel ranges
pub const LEGACY_RANDOM_CHANNEL_START: u32 = 100;

/// Platform lookup failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Directory cannot be reached
    #[error("platform directory unavailable: {0}")]
    Unavailable(String),

    /// Lookup failed for one address
    #[error("cannot read platform for {medium_type} '{address}': {reason}")]
    Lookup {
        /// Medium type queried
        medium_type: String,
        /// Address queried
        address: String,
        /// Why it failed
        reason: String,
    },
}

/// Source of platform records
///
/// Shared between acquisition loops; implementations must be thread-safe.
pub trait PlatformDirectory: Send + Sync {
    /// Find the platform with a transport medium of `medium_type` and
    /// `address`, valid at `at`
    fn find_platform(
        &self,
        medium_type: &str,
        address: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<PlatformRef>, DirectoryError>;

    /// Pick the transport medium of `platform` that carried a message
    fn resolve_transport_medium(
        &self,
        platform: &PlatformRef,
        address: &str,
        channel: Option<u32>,
        legacy_ranges: bool,
    ) -> Option<TransportMediumRef> {
        ChannelMatcher::new(legacy_ranges).resolve(platform, address, channel)
    }
}

/// Default transport-medium matching
///
/// Among media whose id equals the address:
/// - with legacy ranges, channels below 100 select the self-timed medium
///   and the rest the random medium;
/// - otherwise the medium assigned the message's channel wins;
/// - failing both, the first medium with the address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMatcher {
    legacy_ranges: bool,
}

impl ChannelMatcher {
    /// Create a matcher
    #[must_use]
    pub const fn new(legacy_ranges: bool) -> Self {
        Self { legacy_ranges }
    }

    /// Match a medium of `platform`
    #[must_use]
    pub fn resolve(
        self,
        platform: &PlatformRef,
        address: &str,
        channel: Option<u32>,
    ) -> Option<TransportMediumRef> {
        let candidates: Vec<&TransportMediumRef> = platform
            .transport_media
            .iter()
            .filter(|m| m.medium_id.eq_ignore_ascii_case(address))
            .collect();
        let first = *candidates.first()?;

        let matched = match channel {
            Some(chan) if self.legacy_ranges => {
                let wanted = if chan < LEGACY_RANDOM_CHANNEL_START {
                    MediumKind::SelfTimed
                } else {
                    MediumKind::Random
                };
                candidates.iter().find(|m| m.kind() == wanted)
            }
            Some(chan) => candidates.iter().find(|m| m.channel == Some(chan)),
            None => None,
        };
        Some(matched.copied().unwrap_or(first).clone())
    }
}

/// Directory held in memory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    platforms: RwLock<Vec<PlatformRef>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a platform record
    pub fn insert(&self, platform: PlatformRef) {
        if let Ok(mut platforms) = self.platforms.write() {
            platforms.push(platform);
        }
    }

    /// Number of platform records
    #[must_use]
    pub fn len(&self) -> usize {
        self.platforms.read().map_or(0, |p| p.len())
    }

    /// Check if the directory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<PlatformRef> for InMemoryDirectory {
    fn from_iter<I: IntoIterator<Item = PlatformRef>>(iter: I) -> Self {
        Self {
            platforms: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl PlatformDirectory for InMemoryDirectory {
    fn find_platform(
        &self,
        wanted: &str,
        address: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<PlatformRef>, DirectoryError> {
        let platforms = self
            .platforms
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(platforms
            .iter()
            .filter(|p| p.is_current(at))
            .find(|p| {
                p.transport_media.iter().any(|m| {
                    medium_type::matches(wanted, &m.medium_type)
                        && m.medium_id.eq_ignore_ascii_case(address)
                })
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn river() -> PlatformRef {
        PlatformRef::new("BIGRIVER")
            .with_medium(
                TransportMediumRef::new(medium_type::GOES_SELF_TIMED, "CE31D030").with_channel(31),
            )
            .with_medium(
                TransportMediumRef::new(medium_type::GOES_RANDOM, "CE31D030").with_channel(118),
            )
    }

    #[test]
    fn test_legacy_ranges() {
        let matcher = ChannelMatcher::new(true);
        let st = matcher.resolve(&river(), "CE31D030", Some(42)).unwrap();
        assert_eq!(st.kind(), MediumKind::SelfTimed);
        let rd = matcher.resolve(&river(), "CE31D030", Some(100)).unwrap();
        assert_eq!(rd.kind(), MediumKind::Random);
    }

    #[test]
    fn test_exact_channel_then_first() {
        let matcher = ChannelMatcher::new(false);
        let rd = matcher.resolve(&river(), "ce31d030", Some(118)).unwrap();
        assert_eq!(rd.medium_type, medium_type::GOES_RANDOM);
        let first = matcher.resolve(&river(), "CE31D030", Some(7)).unwrap();
        assert_eq!(first.medium_type, medium_type::GOES_SELF_TIMED);
        let first = matcher.resolve(&river(), "CE31D030", None).unwrap();
        assert_eq!(first.channel, Some(31));
        assert!(matcher.resolve(&river(), "00000000", Some(31)).is_none());
    }

    #[test]
    fn test_in_memory_lookup() {
        let dir: InMemoryDirectory = [river()].into_iter().collect();
        let found = dir.find_platform(medium_type::GOES, "CE31D030", None).unwrap();
        assert_eq!(found.unwrap().name, "BIGRIVER");
        assert!(
            dir.find_platform(medium_type::IRIDIUM, "CE31D030", None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_expired_platform_skipped() {
        let mut old = river();
        old.expires = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let dir = InMemoryDirectory::new();
        dir.insert(old);
        let at = Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(dir.find_platform(medium_type::GOES, "CE31D030", at).unwrap().is_none());
        let at = Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap());
        assert!(dir.find_platform(medium_type::GOES, "CE31D030", at).unwrap().is_some());
    }
}
