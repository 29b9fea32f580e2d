use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ddsacq::acquisition::{
    AcquisitionConfig, AcquisitionLoop, BadMessagePolicy, EndReason, InMemoryDirectory,
    MessageSource, RetrieveError,
};
use ddsacq::config::Properties;
use ddsacq::header::{HeaderType, ParseFailure};
use ddsacq::message::{PlatformRef, TransportMediumRef, TypedValue, keys, medium_type};
use ddsacq::protocol::{DcpMessage, MessageFlags, ServerError};
use ddsacq::session::{
    ConnectionError, Credentials, NetworkList, NetworkListItem, Next, SearchCriteria,
    SecretResolver, SessionError, SessionState,
};

const GOOD: &[u8] = b"CE31D03010132120000G44+0NN118EXE00004data";
const BAD_TIME: &[u8] = b"CE31D030notatimeyetG44+0NN118EXE00004data";
const BAD_CHANNEL: &[u8] = b"CE31D03010132120000G44+0NNABCEXE00004data";
const DAPS_STATUS: &[u8] = b"CE31D03010132120000M44+0NN118EXE00004data";

/// Replays a fixed script of message outcomes, then reports idle
#[derive(Debug)]
struct ScriptedSource {
    state: SessionState,
    script: VecDeque<Result<Next, SessionError>>,
    refuse_connect: bool,
    connects: usize,
    filters: Vec<SearchCriteria>,
    lists: Vec<String>,
}

impl ScriptedSource {
    fn new(script: impl IntoIterator<Item = Result<Next, SessionError>>) -> Self {
        Self {
            state: SessionState::Disconnected,
            script: script.into_iter().collect(),
            refuse_connect: false,
            connects: 0,
            filters: Vec::new(),
            lists: Vec::new(),
        }
    }

    fn messages(data: &[&'static [u8]]) -> Self {
        Self::new(data.iter().map(|d| Ok(goes(d))))
    }
}

impl MessageSource for ScriptedSource {
    fn state(&self) -> SessionState {
        self.state
    }

    fn endpoint(&self) -> String {
        "scripted:16003".to_string()
    }

    fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.refuse_connect {
            return Err(ConnectionError::Unreachable {
                host: "scripted".into(),
                port: 16003,
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        self.connects += 1;
        self.state = SessionState::Connected;
        Ok(())
    }

    fn authenticate(
        &mut self,
        _credentials: &Credentials,
        _resolver: &dyn SecretResolver,
    ) -> Result<(), ConnectionError> {
        self.state = SessionState::Authenticated;
        Ok(())
    }

    fn send_filter(&mut self, criteria: &SearchCriteria) -> Result<(), SessionError> {
        self.filters.push(criteria.clone());
        Ok(())
    }

    fn send_device_list(&mut self, list: &NetworkList) -> Result<(), SessionError> {
        self.lists.push(list.name().to_string());
        Ok(())
    }

    fn begin_streaming(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Streaming;
        Ok(())
    }

    fn next_message(&mut self, _timeout: Duration) -> Result<Next, SessionError> {
        match self.script.pop_front() {
            Some(Err(err)) => {
                self.state = SessionState::Disconnected;
                Err(err)
            }
            Some(next) => next,
            None => Ok(Next::Idle),
        }
    }

    fn close(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

fn goes(data: &'static [u8]) -> Next {
    let flags = MessageFlags::new()
        .with(MessageFlags::MSG_PRESENT)
        .with(MessageFlags::SRC_DDS)
        .with_type(MessageFlags::TYPE_GOES);
    Next::Message(DcpMessage::new(data, flags))
}

fn config() -> AcquisitionConfig {
    AcquisitionConfig {
        timeout: Duration::from_millis(20),
        idle_pause: Duration::from_millis(1),
        allow_null_platform: true,
        source_name: "scripted:16003".into(),
        ..AcquisitionConfig::default()
    }
}

fn opened(source: ScriptedSource, config: AcquisitionConfig) -> AcquisitionLoop<ScriptedSource> {
    let mut acq = AcquisitionLoop::new(source, config);
    acq.open().unwrap();
    acq
}

#[test]
fn test_decodes_and_enriches() {
    let mut acq = opened(ScriptedSource::messages(&[GOOD]), config());
    let msg = acq.retrieve().unwrap();

    assert_eq!(msg.medium_id(), Some("CE31D030"));
    assert_eq!(msg.header_type(), Some(HeaderType::Goes));
    assert_eq!(msg.source_name(), "scripted:16003");
    assert_eq!(msg.data(), b"data");
    assert_eq!(msg.measurement(keys::CHANNEL), Some(&TypedValue::Int(118)));
    assert!(msg.measurement(keys::DCP_MSG_FLAGS).is_some());
    assert!(msg.platform().is_none());
}

#[test]
fn test_retrieve_requires_open() {
    let mut acq = AcquisitionLoop::new(ScriptedSource::messages(&[GOOD]), config());
    let err = acq.retrieve().unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_blocked_after_deadline() {
    let mut cfg = config();
    cfg.retries = 1;
    let mut acq = opened(ScriptedSource::new([]), cfg);

    match acq.retrieve() {
        Err(RetrieveError::Blocked { waited }) => {
            assert!(waited >= Duration::from_millis(40));
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
    assert_eq!(acq.state(), SessionState::Streaming);
}

#[test]
fn test_idle_then_message() {
    let mut acq = opened(
        ScriptedSource::new([Ok(Next::Idle), Ok(Next::Idle), Ok(goes(GOOD))]),
        AcquisitionConfig {
            timeout: Duration::from_secs(5),
            ..config()
        },
    );
    assert_eq!(acq.retrieve().unwrap().medium_id(), Some("CE31D030"));
}

#[test]
fn test_breaker_skips_bad_messages_below_threshold() {
    let mut cfg = config();
    cfg.bad_message_policy = BadMessagePolicy::CloseAfter(3);
    let source = ScriptedSource::messages(&[BAD_TIME, GOOD, BAD_CHANNEL, BAD_TIME, GOOD]);
    let mut acq = opened(source, cfg);

    let msg = acq.retrieve().unwrap();
    assert_eq!(msg.medium_id(), Some("CE31D030"));
    assert_eq!(acq.consecutive_bad_messages(), 0);

    // Two in a row stay under the threshold.
    assert_eq!(acq.retrieve().unwrap().header_type(), Some(HeaderType::Goes));
    assert_eq!(acq.consecutive_bad_messages(), 0);
    assert_eq!(acq.state(), SessionState::Streaming);
    assert!(acq.last_error_at().is_none());
}

#[test]
fn test_breaker_trips_after_threshold() {
    let mut cfg = config();
    cfg.bad_message_policy = BadMessagePolicy::CloseAfter(3);
    let source = ScriptedSource::messages(&[BAD_TIME, BAD_CHANNEL, BAD_TIME, GOOD, GOOD]);
    let mut acq = opened(source, cfg);

    match acq.retrieve() {
        Err(RetrieveError::Fatal {
            reason,
            source: Some(source),
        }) => {
            assert!(reason.contains("3 consecutive bad messages"), "{reason}");
            let failure = source.downcast_ref::<ParseFailure>().unwrap();
            assert!(failure.reason.contains("time"), "{failure}");
            assert_eq!(failure.fragment, "CE31D030notatimeyetG");
        }
        other => panic!("expected Fatal, got {other:?}"),
    }
    assert_eq!(acq.consecutive_bad_messages(), 3);
    assert_eq!(acq.state(), SessionState::Disconnected);
    assert!(acq.last_error_at().is_some());

    assert!(acq.retrieve().unwrap_err().is_fatal());

    acq.open().unwrap();
    assert_eq!(acq.consecutive_bad_messages(), 0);
    assert_eq!(acq.retrieve().unwrap().medium_id(), Some("CE31D030"));
}

#[test]
fn test_breaker_threshold_one_is_fatal_at_once() {
    let mut cfg = config();
    cfg.bad_message_policy = BadMessagePolicy::from_threshold(0);
    let mut acq = opened(ScriptedSource::messages(&[BAD_TIME, GOOD]), cfg);

    assert!(acq.retrieve().unwrap_err().is_fatal());
    assert_eq!(acq.state(), SessionState::Disconnected);
}

#[test]
fn test_oversized_timeout_waits_without_deadline() {
    let props: Properties = [
        ("host", "scripted"),
        ("user", "ops"),
        ("lrgs.timeout", "18446744073709551615"),
        ("lrgs.retries", "3"),
    ]
    .into_iter()
    .collect();
    let cfg = AcquisitionConfig {
        idle_pause: Duration::from_millis(1),
        allow_null_platform: true,
        ..AcquisitionConfig::from_properties(&props).unwrap()
    };
    assert_eq!(cfg.timeout, Duration::from_secs(u64::MAX));

    let mut acq = opened(
        ScriptedSource::new([Ok(Next::Idle), Ok(Next::Idle), Ok(goes(GOOD))]),
        cfg,
    );
    assert_eq!(acq.retrieve().unwrap().medium_id(), Some("CE31D030"));
}

#[test]
fn test_tolerate_returns_undecoded() {
    let mut acq = opened(ScriptedSource::messages(&[BAD_TIME, BAD_CHANNEL]), config());

    let msg = acq.retrieve().unwrap();
    assert_eq!(msg.payload().as_ref(), BAD_TIME);
    assert_eq!(msg.medium_id(), None);
    assert_eq!(msg.header_type(), None);
    assert!(msg.measurement(keys::DCP_MSG_FLAGS).is_none());
    assert_eq!(msg.source_name(), "scripted:16003");

    // Undecodable channel: the raw message, not the half-decoded one.
    let msg = acq.retrieve().unwrap();
    assert_eq!(msg.medium_id(), None);
    assert_eq!(acq.consecutive_bad_messages(), 2);
    assert_eq!(acq.state(), SessionState::Streaming);
}

#[test]
fn test_daps_status_skipped_unless_allowed() {
    let mut acq = opened(ScriptedSource::messages(&[DAPS_STATUS, GOOD]), config());
    let msg = acq.retrieve().unwrap();
    assert_eq!(
        msg.measurement(keys::FAILURE_CODE),
        Some(&TypedValue::Char('G'))
    );

    let mut cfg = config();
    cfg.allow_daps_status = true;
    let mut acq = opened(ScriptedSource::messages(&[DAPS_STATUS, GOOD]), cfg);
    let msg = acq.retrieve().unwrap();
    assert_eq!(
        msg.measurement(keys::FAILURE_CODE),
        Some(&TypedValue::Char('M'))
    );
}

#[test]
fn test_unknown_platform() {
    let mut cfg = config();
    cfg.allow_null_platform = false;
    let mut acq = AcquisitionLoop::new(ScriptedSource::messages(&[GOOD]), cfg)
        .with_directory(Arc::new(InMemoryDirectory::new()));
    acq.open().unwrap();

    match acq.retrieve() {
        Err(RetrieveError::UnknownPlatform(unknown)) => {
            assert_eq!(unknown.address, "CE31D030");
            assert_eq!(unknown.channel, Some(118));
            assert_eq!(unknown.medium_type, medium_type::GOES);
            assert_eq!(unknown.fragment, "CE31D03010132120000G");
            assert_eq!(
                unknown.to_string(),
                "no platform matching 'CE31D030' and channel 118 and medium type goes \
                 near 'CE31D03010132120000G'"
            );
        }
        other => panic!("expected UnknownPlatform, got {other:?}"),
    }
    assert_eq!(acq.state(), SessionState::Streaming);
}

#[test]
fn test_platform_bound_by_channel() {
    let directory: InMemoryDirectory = [PlatformRef::new("BIGRIVER")
        .with_medium(
            TransportMediumRef::new(medium_type::GOES_SELF_TIMED, "CE31D030").with_channel(31),
        )
        .with_medium(
            TransportMediumRef::new(medium_type::GOES_RANDOM, "CE31D030").with_channel(118),
        )]
    .into_iter()
    .collect();

    let mut cfg = config();
    cfg.allow_null_platform = false;
    let mut acq = AcquisitionLoop::new(ScriptedSource::messages(&[GOOD]), cfg)
        .with_directory(Arc::new(directory));
    acq.open().unwrap();

    let msg = acq.retrieve().unwrap();
    assert_eq!(msg.platform().map(|p| p.name.as_str()), Some("BIGRIVER"));
    let medium = msg.transport_medium().unwrap();
    assert_eq!(medium.medium_type, medium_type::GOES_RANDOM);
    assert_eq!(medium.channel, Some(118));
}

#[test]
fn test_until_reached_ends_stream() {
    let mut acq = opened(ScriptedSource::new([Ok(goes(GOOD)), Ok(Next::End)]), config());
    assert!(acq.retrieve().is_ok());
    assert!(matches!(
        acq.retrieve(),
        Err(RetrieveError::Ended(EndReason::UntilReached))
    ));
    assert_eq!(acq.state(), SessionState::Disconnected);
    assert!(acq.last_error_at().is_none());
}

#[test]
fn test_cancel_aborts_idle_wait() {
    let mut cfg = config();
    cfg.timeout = Duration::from_secs(60);
    let mut acq = opened(ScriptedSource::new([]), cfg);

    let token = acq.cancel_token();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
    });
    assert!(matches!(
        acq.retrieve(),
        Err(RetrieveError::Ended(EndReason::Aborted))
    ));
    canceller.join().unwrap();

    // A fresh open clears the request.
    acq.open().unwrap();
    assert!(!acq.cancel_token().is_cancelled());
}

#[test]
fn test_session_error_is_fatal_and_cools_off() {
    let failure = SessionError::Server {
        request: "message request",
        source: ServerError::parse(b"?23,0,Internal error"),
    };
    let mut acq = opened(ScriptedSource::new([Err(failure)]), config());
    acq.set_timeout_sec_on_error(Duration::from_secs(60));

    match acq.retrieve() {
        Err(RetrieveError::Fatal { source, .. }) => assert!(source.is_some()),
        other => panic!("expected Fatal, got {other:?}"),
    }
    assert_eq!(acq.state(), SessionState::Disconnected);
    assert!(acq.last_error_at().is_some());

    assert!(matches!(
        acq.open(),
        Err(ConnectionError::CoolingOff { .. })
    ));
    assert_eq!(acq.source().connects, 1);

    acq.reset_last_error();
    acq.open().unwrap();
    assert_eq!(acq.source().connects, 2);
}

#[test]
fn test_open_failure_records_error() {
    let mut source = ScriptedSource::new([]);
    source.refuse_connect = true;
    let mut acq = AcquisitionLoop::new(source, config());

    assert!(matches!(
        acq.open(),
        Err(ConnectionError::Unreachable { .. })
    ));
    assert!(acq.last_error_at().is_some());
    assert_eq!(acq.state(), SessionState::Disconnected);

    // Zero cooldown: retry is allowed at once.
    acq.source_mut().refuse_connect = false;
    acq.open().unwrap();
    assert_eq!(acq.state(), SessionState::Streaming);
}

#[test]
fn test_open_uploads_selection() {
    let mut list = NetworkList::new("springfield.nl");
    list.push(NetworkListItem::new("ce31d030"));

    let mut cfg = config();
    cfg.criteria.since = Some("now - 1 hour".into());
    cfg.device_lists.push(list);
    let acq = opened(ScriptedSource::new([]), cfg);

    let source = acq.source();
    assert_eq!(source.lists, vec!["springfield.nl"]);
    assert_eq!(source.filters.len(), 1);
    assert_eq!(source.filters[0].netlists, vec!["springfield.nl"]);
    assert_eq!(source.filters[0].since.as_deref(), Some("now - 1 hour"));
}

#[test]
fn test_empty_selection_sends_no_filter() {
    let acq = opened(ScriptedSource::new([]), config());
    assert!(acq.source().filters.is_empty());
    assert_eq!(acq.state(), SessionState::Streaming);
}
