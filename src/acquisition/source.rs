//! Message source seam between the loop and the session

use std::time::Duration;

use crate::session::{
    ConnectionError, Credentials, NetworkList, Next, SearchCriteria, SecretResolver,
    SessionClient, SessionError, SessionState,
};

/// Session operations the acquisition loop drives
///
/// [`SessionClient`] is the production implementation.
pub trait MessageSource: Send {
    /// Current session state
    fn state(&self) -> SessionState;

    /// `host:port` (or equivalent) for log and error messages
    fn endpoint(&self) -> String;

    /// Open the transport
    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Log in
    fn authenticate(
        &mut self,
        credentials: &Credentials,
        resolver: &dyn SecretResolver,
    ) -> Result<(), ConnectionError>;

    /// Upload search criteria
    fn send_filter(&mut self, criteria: &SearchCriteria) -> Result<(), SessionError>;

    /// Upload a network list
    fn send_device_list(&mut self, list: &NetworkList) -> Result<(), SessionError>;

    /// Switch to streaming
    fn begin_streaming(&mut self) -> Result<(), SessionError>;

    /// Request one message
    fn next_message(&mut self, timeout: Duration) -> Result<Next, SessionError>;

    /// Close; idempotent
    fn close(&mut self);
}

impl MessageSource for SessionClient {
    fn state(&self) -> SessionState {
        Self::state(self)
    }

    fn endpoint(&self) -> String {
        Self::endpoint(self)
    }

    fn connect(&mut self) -> Result<(), ConnectionError> {
        Self::connect(self)
    }

    fn authenticate(
        &mut self,
        credentials: &Credentials,
        resolver: &dyn SecretResolver,
    ) -> Result<(), ConnectionError> {
        Self::authenticate(self, credentials, resolver)
    }

    fn send_filter(&mut self, criteria: &SearchCriteria) -> Result<(), SessionError> {
        Self::send_filter(self, criteria)
    }

    fn send_device_list(&mut self, list: &NetworkList) -> Result<(), SessionError> {
        Self::send_device_list(self, list)
    }

    fn begin_streaming(&mut self) -> Result<(), SessionError> {
        Self::begin_streaming(self)
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Next, SessionError> {
        Self::next_message(self, timeout)
    }

    fn close(&mut self) {
        Self::close(self);
    }
}
