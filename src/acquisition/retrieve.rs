//! Retrieval loop with the bad-message breaker

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace, warn};

use super::resolver::{LookupKey, Resolver};
use super::{
    AcquisitionConfig, BadMessagePolicy, CancelToken, EndReason, MessageSource,
    PlatformDirectory, RetrieveError,
};
use crate::header::{HeaderParserRegistry, ParseFailure};
use crate::message::{RawMessage, TypedValue, keys};
use crate::protocol::DcpMessage;
use crate::session::{ConnectionError, EnvSecretResolver, Next, SecretResolver, SessionState};

/// Pulls messages from one source, decodes their headers and binds them to
/// platforms
///
/// ```text
/// open() ──> retrieve() ──> retrieve() ──> ... ──> close()
///               │
///               ├─ Ok(RawMessage)
///               ├─ Blocked        (quiet past the deadline; call again)
///               ├─ UnknownPlatform
///               ├─ Ended          (until reached or cancelled)
///               └─ Fatal          (session closed or breaker tripped; open() again)
/// ```
pub struct AcquisitionLoop<S> {
    source: S,
    config: AcquisitionConfig,
    registry: HeaderParserRegistry,
    resolver: Resolver,
    secrets: Box<dyn SecretResolver>,
    cancel: CancelToken,
    consecutive_bad_messages: u32,
    last_error_at: Option<Instant>,
    tripped: bool,
}

impl<S: MessageSource> AcquisitionLoop<S> {
    /// Create a loop over `source` with the standard parsers, environment
    /// credential resolution and no platform directory
    pub fn new(source: S, config: AcquisitionConfig) -> Self {
        let resolver = Resolver::new(None, config.legacy_ranges, config.allow_null_platform);
        Self {
            source,
            config,
            registry: HeaderParserRegistry::new(),
            resolver,
            secrets: Box::new(EnvSecretResolver::new()),
            cancel: CancelToken::new(),
            consecutive_bad_messages: 0,
            last_error_at: None,
            tripped: false,
        }
    }

    /// Use a custom parser registry
    #[must_use]
    pub fn with_registry(mut self, registry: HeaderParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolve platforms against `directory`
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn PlatformDirectory>) -> Self {
        self.resolver = Resolver::new(
            Some(directory),
            self.config.legacy_ranges,
            self.config.allow_null_platform,
        );
        self
    }

    /// Use a custom credential resolver
    #[must_use]
    pub fn with_secret_resolver(mut self, secrets: Box<dyn SecretResolver>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Configuration
    pub const fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Underlying source
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Underlying source, mutably
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Session state of the source
    pub fn state(&self) -> SessionState {
        self.source.state()
    }

    /// Handle that aborts an idle wait from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Header failures since the last decoded message
    pub const fn consecutive_bad_messages(&self) -> u32 {
        self.consecutive_bad_messages
    }

    /// When the last session failure happened
    pub const fn last_error_at(&self) -> Option<Instant> {
        self.last_error_at
    }

    /// Forget the last failure so [`open`](Self::open) is not refused
    pub fn reset_last_error(&mut self) {
        self.last_error_at = None;
    }

    /// Refuse [`open`](Self::open) for `cooldown` after a failure
    pub fn set_timeout_sec_on_error(&mut self, cooldown: Duration) {
        self.config.timeout_sec_on_error = cooldown;
    }

    /// Connect, log in, upload the selection and start streaming.
    ///
    /// Refused with [`ConnectionError::CoolingOff`] while a recent failure
    /// is cooling off.
    #[instrument(level = "info", skip(self), fields(endpoint = %self.source.endpoint()))]
    pub fn open(&mut self) -> Result<(), ConnectionError> {
        let cooldown = self.config.timeout_sec_on_error;
        if let Some(at) = self.last_error_at {
            let elapsed = at.elapsed();
            if !cooldown.is_zero() && elapsed < cooldown {
                return Err(ConnectionError::CoolingOff {
                    elapsed,
                    remaining: cooldown - elapsed,
                });
            }
        }

        self.cancel.reset();
        self.tripped = false;
        self.consecutive_bad_messages = 0;

        if let Err(err) = self.start_session() {
            warn!(error = %err, "cannot open session");
            self.source.close();
            self.last_error_at = Some(Instant::now());
            return Err(err);
        }
        info!("session open");
        Ok(())
    }

    fn start_session(&mut self) -> Result<(), ConnectionError> {
        if self.source.state() != SessionState::Disconnected {
            self.source.close();
        }
        self.source.connect()?;
        self.source
            .authenticate(&self.config.credentials, self.secrets.as_ref())?;

        let mut criteria = self.config.criteria.clone();
        for list in &self.config.device_lists {
            self.source.send_device_list(list)?;
            criteria.add_netlist(list.name());
        }
        if !criteria.is_empty() {
            self.source.send_filter(&criteria)?;
        }
        self.source.begin_streaming()?;
        Ok(())
    }

    /// Retrieve the next message.
    ///
    /// Waits through idle periods until `timeout × (retries + 1)` has
    /// passed. DAPS status messages are skipped unless allowed. Under
    /// [`BadMessagePolicy::CloseAfter`] an undecodable message is dropped
    /// and the next one fetched until the threshold closes the session.
    pub fn retrieve(&mut self) -> Result<RawMessage, RetrieveError> {
        if self.tripped || self.source.state() != SessionState::Streaming {
            return Err(RetrieveError::Fatal {
                reason: format!("not connected to {}", self.source.endpoint()),
                source: None,
            });
        }

        let started = Instant::now();
        // None when the budget does not fit in an Instant: wait indefinitely.
        let deadline = started.checked_add(self.config.deadline());
        loop {
            let dcp = self.fetch(started, deadline)?;
            if let Some(msg) = self.convert(&dcp)? {
                return Ok(msg);
            }
        }
    }

    fn fetch(
        &mut self,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<DcpMessage, RetrieveError> {
        loop {
            if self.cancel.is_cancelled() {
                debug!("retrieve aborted");
                return Err(RetrieveError::Ended(EndReason::Aborted));
            }

            match self.source.next_message(self.config.timeout) {
                Ok(Next::Message(msg)) => {
                    if msg.is_daps_status() && !self.config.allow_daps_status {
                        debug!(
                            failure_code = %msg.failure_code(),
                            flags = %msg.flags(),
                            "skipping DAPS status message"
                        );
                        continue;
                    }
                    return Ok(msg);
                }
                Ok(Next::Idle) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(RetrieveError::Blocked {
                            waited: started.elapsed(),
                        });
                    }
                    trace!("server caught up, pausing");
                    std::thread::sleep(self.config.idle_pause);
                }
                Ok(Next::End) => {
                    info!("until time reached");
                    self.source.close();
                    return Err(RetrieveError::Ended(EndReason::UntilReached));
                }
                Err(err) => {
                    self.source.close();
                    self.last_error_at = Some(Instant::now());
                    return Err(RetrieveError::fatal(
                        format!("session error on {}", self.source.endpoint()),
                        err,
                    ));
                }
            }
        }
    }

    /// `Ok(None)` drops the message and asks for the next one
    fn convert(&mut self, dcp: &DcpMessage) -> Result<Option<RawMessage>, RetrieveError> {
        let raw = RawMessage::new(dcp.data().clone())
            .with_source(self.config.source_name.clone())
            .with_flags(dcp.flags());

        match self.decode(raw.clone()) {
            Ok((mut msg, key)) => {
                self.consecutive_bad_messages = 0;
                enrich(&mut msg, dcp);
                self.resolver.resolve(&mut msg, &key)?;
                Ok(Some(msg))
            }
            Err(failure) => self.bad_message(raw, failure),
        }
    }

    fn decode(&self, raw: RawMessage) -> Result<(RawMessage, LookupKey), ParseFailure> {
        let msg = self.registry.parse(raw)?;
        let key = LookupKey::from_message(&msg)?;
        Ok((msg, key))
    }

    fn bad_message(
        &mut self,
        raw: RawMessage,
        failure: ParseFailure,
    ) -> Result<Option<RawMessage>, RetrieveError> {
        self.consecutive_bad_messages = self.consecutive_bad_messages.saturating_add(1);
        match self.config.bad_message_policy {
            BadMessagePolicy::Tolerate => {
                debug!(error = %failure, "unable to parse header, returning message undecoded");
                Ok(Some(raw))
            }
            BadMessagePolicy::CloseAfter(max) if self.consecutive_bad_messages >= max => {
                warn!(
                    count = self.consecutive_bad_messages,
                    error = %failure,
                    "too many consecutive bad messages, closing"
                );
                self.source.close();
                self.last_error_at = Some(Instant::now());
                self.tripped = true;
                Err(RetrieveError::fatal(
                    format!(
                        "{} consecutive bad messages from {}",
                        self.consecutive_bad_messages,
                        self.source.endpoint()
                    ),
                    failure,
                ))
            }
            BadMessagePolicy::CloseAfter(_) => {
                debug!(
                    count = self.consecutive_bad_messages,
                    error = %failure,
                    "bad message, fetching the next one"
                );
                Ok(None)
            }
        }
    }

    /// Close the session; idempotent
    pub fn close(&mut self) {
        self.source.close();
    }
}

fn enrich(msg: &mut RawMessage, dcp: &DcpMessage) {
    if let Some(baud) = dcp.baud {
        msg.set_measurement(keys::BAUD, i64::from(baud));
    }
    if let Some(t) = dcp.carrier_start {
        msg.set_measurement(keys::CARRIER_START, t);
    }
    if let Some(t) = dcp.carrier_stop {
        msg.set_measurement(keys::CARRIER_STOP, t);
    }
    if let Some(t) = dcp.domsat_time {
        msg.set_measurement(keys::DOMSAT_TIME, t);
    }
    msg.set_measurement(
        keys::DCP_MSG_FLAGS,
        TypedValue::Int(i64::from(dcp.flags().bits())),
    );
}

impl<S: std::fmt::Debug> std::fmt::Debug for AcquisitionLoop<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionLoop")
            .field("source", &self.source)
            .field("consecutive_bad_messages", &self.consecutive_bad_messages)
            .field("tripped", &self.tripped)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageFlags;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_enrich_copies_transport_fields() {
        let mut dcp = DcpMessage::new(&b"x"[..], MessageFlags::new().with(MessageFlags::SRC_DDS));
        dcp.baud = Some(300);
        dcp.carrier_start = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut msg = RawMessage::new(&b"x"[..]);
        enrich(&mut msg, &dcp);
        assert_eq!(msg.measurement(keys::BAUD), Some(&TypedValue::Int(300)));
        assert!(msg.measurement(keys::CARRIER_START).is_some());
        assert!(msg.measurement(keys::CARRIER_STOP).is_none());
        assert_eq!(
            msg.measurement(keys::DCP_MSG_FLAGS),
            Some(&TypedValue::Int(i64::from(MessageFlags::SRC_DDS)))
        );
    }
}
