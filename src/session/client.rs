//! LDDS session client

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::auth::auth_hello_body;
use super::connection::Connection;
use super::{
    ConnectionError, Credentials, NetworkList, SearchCriteria, SecretResolver, SessionError,
    SessionState,
};
use crate::protocol::{
    self, CRITERIA_NAME_LEN, DEFAULT_PORT, DcpMessage, Frame, MessageId, NETLIST_NAME_LEN,
    PROTOCOL_VERSION, ServerError,
};

/// Criteria name used for in-memory uploads
const CRITERIA_OBJECT: &str = "OBJECT";

/// Name used for network lists without one
const UNNAMED_NETLIST: &str = "list-in-memory";

/// Wait for the reply to Stop or Goodbye
const ABORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra second granted to the server beyond the caller's timeout
const REPLY_GRACE: Duration = Duration::from_secs(1);

/// Session endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(20),
        }
    }
}

impl SessionConfig {
    /// Config for `host:port` with the default connect timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

/// Outcome of one message request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// A message
    Message(DcpMessage),
    /// Nothing available yet
    Idle,
    /// The until time of the criteria was reached
    End,
}

/// Client side of one LDDS session
///
/// The session moves through [`SessionState`]:
/// [`connect`](Self::connect) → [`authenticate`](Self::authenticate) →
/// [`send_filter`](Self::send_filter) / [`send_device_list`](Self::send_device_list) →
/// [`begin_streaming`](Self::begin_streaming) →
/// [`next_message`](Self::next_message) … → [`close`](Self::close).
///
/// Selection state sent while authenticated is remembered and re-sent by
/// [`reconnect`](Self::reconnect). Any protocol or server error closes the
/// socket before it is returned.
#[derive(Debug)]
pub struct SessionClient {
    id: Uuid,
    config: SessionConfig,
    state: SessionState,
    conn: Option<Connection>,
    user: Option<String>,
    server_version: Option<u32>,
    criteria: Option<SearchCriteria>,
    device_lists: Vec<NetworkList>,
}

impl SessionClient {
    /// Create a disconnected client
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SessionState::Disconnected,
            conn: None,
            user: None,
            server_version: None,
            criteria: None,
            device_lists: Vec::new(),
        }
    }

    /// Session id used in log spans
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Endpoint configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Protocol version reported by the server at login
    #[must_use]
    pub const fn server_version(&self) -> Option<u32> {
        self.server_version
    }

    /// User name the session logged in as
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// `host:port` of the server
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Open the TCP connection. No login is performed.
    #[instrument(level = "debug", skip(self), fields(session = %self.id, host = %self.config.host, port = self.config.port))]
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.state != SessionState::Disconnected {
            return Err(ConnectionError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        self.state = SessionState::Connecting;
        match Connection::open(&self.config.host, self.config.port, self.config.connect_timeout) {
            Ok(conn) => {
                debug!(peer = %conn.peer(), "connected");
                self.conn = Some(conn);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                Err(err)
            }
        }
    }

    /// Log in. A blank password gives an unauthenticated hello.
    ///
    /// Credential references are resolved here and the resolved values are
    /// dropped before returning.
    #[instrument(level = "debug", skip(self, credentials, resolver), fields(session = %self.id))]
    pub fn authenticate(
        &mut self,
        credentials: &Credentials,
        resolver: &dyn SecretResolver,
    ) -> Result<(), ConnectionError> {
        if self.state != SessionState::Connected {
            return Err(ConnectionError::InvalidState {
                operation: "authenticate",
                state: self.state,
            });
        }

        let result = self.hello(credentials, resolver);
        match result {
            Ok((user, version)) => {
                info!(%user, server_version = version, "logged in");
                self.user = Some(user);
                self.server_version = Some(version);
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    fn hello(
        &mut self,
        credentials: &Credentials,
        resolver: &dyn SecretResolver,
    ) -> Result<(String, u32), ConnectionError> {
        let (user, password) = credentials.resolve(resolver)?;
        let (id, body) = match &password {
            Some(password) => (
                MessageId::AuthHello,
                auth_hello_body(&user, password, Utc::now(), PROTOCOL_VERSION),
            ),
            None => (MessageId::Hello, format!("{user} {PROTOCOL_VERSION}")),
        };
        drop(password);

        let conn = self.conn.as_mut().ok_or(ConnectionError::InvalidState {
            operation: "authenticate",
            state: self.state,
        })?;
        conn.set_read_timeout(Some(ABORT_TIMEOUT))?;
        let reply = conn.request(&Frame::new(id, body.into_bytes()))?;
        expect_id(&reply, id)?;

        let text = reply.body_text();
        if text.starts_with('?') || text.starts_with("HELLO ???") {
            return Err(ConnectionError::Authentication {
                user,
                source: ServerError::parse(text.as_bytes()),
            });
        }

        let version = match id {
            MessageId::AuthHello => auth_hello_version(&text)?,
            _ => hello_version(&text),
        };
        Ok((user, version))
    }

    /// Upload search criteria.
    ///
    /// Criteria are always sent in single-message mode. More than
    /// [`MAX_EXPLICIT_ADDRESSES`](super::MAX_EXPLICIT_ADDRESSES) explicit
    /// addresses are moved into temporary network lists uploaded first.
    #[instrument(level = "debug", skip(self, criteria), fields(session = %self.id))]
    pub fn send_filter(&mut self, criteria: &SearchCriteria) -> Result<(), SessionError> {
        self.require_authenticated("send search criteria")?;
        let result = self.upload_criteria(criteria);
        match result {
            Ok(()) => {
                self.criteria = Some(criteria.clone());
                Ok(())
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    fn upload_criteria(&mut self, criteria: &SearchCriteria) -> Result<(), SessionError> {
        let mut to_send = criteria.clone();
        to_send.single = true;
        for list in to_send.split_explicit_addresses() {
            self.upload_netlist(&list)?;
        }

        let text = to_send.to_text();
        debug!(bytes = text.len(), "sending criteria");
        let frame = Frame::with_name_header(
            MessageId::Criteria,
            CRITERIA_OBJECT,
            CRITERIA_NAME_LEN,
            text.as_bytes(),
        );
        self.exchange(&frame, "search criteria")?;
        Ok(())
    }

    /// Upload a network list under its own name
    #[instrument(level = "debug", skip(self, list), fields(session = %self.id, list = list.name()))]
    pub fn send_device_list(&mut self, list: &NetworkList) -> Result<(), SessionError> {
        self.require_authenticated("send network list")?;
        match self.upload_netlist(list) {
            Ok(()) => {
                self.device_lists.retain(|l| l.name() != list.name());
                self.device_lists.push(list.clone());
                Ok(())
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    fn upload_netlist(&mut self, list: &NetworkList) -> Result<(), SessionError> {
        let name = if list.name().is_empty() {
            UNNAMED_NETLIST
        } else {
            list.name()
        };
        // The name must stay NUL-terminated.
        let frame = Frame::with_name_header(
            MessageId::PutNetlist,
            truncate(name, NETLIST_NAME_LEN - 1),
            NETLIST_NAME_LEN,
            list.to_file_string().as_bytes(),
        );
        debug!(name, devices = list.len(), "sending network list");
        self.exchange(&frame, "network list")?;
        Ok(())
    }

    /// Start requesting messages
    pub fn begin_streaming(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Authenticated => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            SessionState::Streaming => Ok(()),
            state => Err(SessionError::InvalidState {
                operation: "begin streaming",
                state,
            }),
        }
    }

    /// Request the next message, waiting up to `timeout` for the reply.
    ///
    /// If no reply arrives in time the request is aborted with Stop; a
    /// message the server sent before seeing the Stop is still returned.
    #[instrument(level = "trace", skip(self), fields(session = %self.id))]
    pub fn next_message(&mut self, timeout: Duration) -> Result<Next, SessionError> {
        if self.state != SessionState::Streaming {
            return Err(SessionError::InvalidState {
                operation: "request message",
                state: self.state,
            });
        }

        let result = self.request_message(timeout);
        if result.is_err() {
            self.teardown();
        }
        result
    }

    fn request_message(&mut self, timeout: Duration) -> Result<Next, SessionError> {
        let conn = self.connection("request message")?;
        conn.set_read_timeout(Some(timeout.saturating_add(REPLY_GRACE)))?;
        conn.send(&Frame::empty(MessageId::Dcp))?;
        match conn.recv() {
            Ok(frame) => interpret_dcp(&frame),
            Err(err) if err.is_timeout() => {
                debug!(?timeout, "no reply, aborting request");
                self.abort_request()
            }
            Err(err) => Err(err.into()),
        }
    }

    fn abort_request(&mut self) -> Result<Next, SessionError> {
        let conn = self.connection("abort request")?;
        conn.set_read_timeout(Some(ABORT_TIMEOUT))?;
        conn.send(&Frame::empty(MessageId::Stop))?;

        let mut reply = conn.recv()?;
        let mut raced = Next::Idle;
        if reply.id() == MessageId::Dcp {
            debug!("message arrived before abort");
            raced = interpret_dcp(&reply)?;
            reply = conn.recv()?;
        }
        expect_id(&reply, MessageId::Stop)?;
        Ok(raced)
    }

    /// Tear down and re-open the session, re-sending the stored network
    /// lists and criteria. Streaming resumes if it was active.
    #[instrument(level = "info", skip(self, credentials, resolver), fields(session = %self.id))]
    pub fn reconnect(
        &mut self,
        credentials: &Credentials,
        resolver: &dyn SecretResolver,
    ) -> Result<(), ConnectionError> {
        let was_streaming = self.state == SessionState::Streaming;
        self.close();

        self.connect()?;
        self.authenticate(credentials, resolver)?;
        for list in self.device_lists.clone() {
            self.send_device_list(&list)?;
        }
        if let Some(criteria) = self.criteria.clone() {
            self.send_filter(&criteria)?;
        }
        if was_streaming {
            self.begin_streaming()?;
        }
        Ok(())
    }

    /// Say goodbye (best effort) and drop the socket. Safe to call in any
    /// state, any number of times.
    #[instrument(level = "debug", skip(self), fields(session = %self.id))]
    pub fn close(&mut self) {
        let connected = self.state.has_socket();
        if let Some(conn) = self.conn.as_mut().filter(|_| connected) {
            if let Err(err) = goodbye(conn) {
                debug!(error = %err, "goodbye failed");
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.shutdown();
            debug!("socket closed");
        }
        self.state = SessionState::Disconnected;
        self.user = None;
        self.server_version = None;
    }

    fn require_authenticated(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Authenticated {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn connection(&mut self, operation: &'static str) -> Result<&mut Connection, SessionError> {
        let state = self.state;
        self.conn
            .as_mut()
            .ok_or(SessionError::InvalidState { operation, state })
    }

    fn exchange(&mut self, frame: &Frame, request: &'static str) -> Result<Frame, SessionError> {
        let conn = self.connection(request)?;
        conn.set_read_timeout(Some(ABORT_TIMEOUT))?;
        let reply = conn.request(frame)?;
        expect_id(&reply, frame.id())?;
        if let Some(source) = reply.server_error() {
            warn!(request, error = %source, "request rejected");
            return Err(SessionError::Server { request, source });
        }
        Ok(reply)
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn goodbye(conn: &mut Connection) -> protocol::Result<()> {
    conn.set_read_timeout(Some(ABORT_TIMEOUT))?;
    let reply = conn.request(&Frame::empty(MessageId::Goodbye))?;
    expect_id(&reply, MessageId::Goodbye)
}

fn interpret_dcp(frame: &Frame) -> Result<Next, SessionError> {
    expect_id(frame, MessageId::Dcp)?;
    if let Some(source) = frame.server_error() {
        if source.is_caught_up() {
            return Ok(Next::Idle);
        }
        if source.is_until_reached() {
            return Ok(Next::End);
        }
        return Err(SessionError::Server {
            request: "message request",
            source,
        });
    }
    Ok(Next::Message(DcpMessage::from_dcp_body(frame.body())?))
}

fn expect_id(frame: &Frame, expected: MessageId) -> protocol::Result<()> {
    if frame.id() == expected {
        Ok(())
    } else {
        Err(protocol::Error::UnexpectedResponse {
            expected,
            got: frame.id(),
        })
    }
}

/// Version from a hello reply `<user> <version>`; 1 when absent or invalid
fn hello_version(text: &str) -> u32 {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(_), Some(v)) => v.parse().unwrap_or_else(|_| {
            warn!(version = v, "invalid protocol version from server, assuming 1");
            1
        }),
        _ => 1,
    }
}

/// Version from an auth-hello reply `<user> <time> <version>`
fn auth_hello_version(text: &str) -> Result<u32, ConnectionError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(protocol::Error::MalformedResponse {
            request: MessageId::AuthHello,
            reason: format!("invalid response '{text}'"),
        }
        .into());
    }
    let raw = tokens[2];
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    Ok(digits.parse().unwrap_or_else(|_| {
        warn!(version = raw, "invalid protocol version from server, assuming 3");
        3
    }))
}

fn truncate(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
