use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use sync_core::{InboundEvent, JobCompleted, JobProgressed, JobStarted};
use sync_engine::{
    ChannelClient, ChannelControl, ChannelSettings, ConnectionState, Credentials, EventHandler,
    EventSink, HandlerSet, Transport, TransportError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    log: Log,
}

impl EventHandler for Recorder {
    fn on_started(&mut self, event: &JobStarted) {
        self.log.borrow_mut().push(format!("started:{}", event.job_id));
    }

    fn on_completed(&mut self, event: &JobCompleted) {
        self.log.borrow_mut().push(format!("completed:{}", event.job_id));
    }

    fn on_connected(&mut self) {
        self.log.borrow_mut().push("connected".to_string());
    }

    fn on_disconnected(&mut self, _reason: &str) {
        self.log.borrow_mut().push("disconnected".to_string());
    }

    fn on_connection_error(&mut self, _message: &str, attempt: u32) {
        self.log.borrow_mut().push(format!("error:{attempt}"));
    }

    fn on_reconnect_failed(&mut self, attempts: u32) {
        self.log.borrow_mut().push(format!("gave-up:{attempts}"));
    }
}

enum Script {
    /// Acknowledge, emit the events, then hold the stream open.
    StayOpen(Vec<InboundEvent>),
    /// Reject every handshake.
    Reject,
}

struct ScriptedTransport {
    opens: Arc<AtomicUsize>,
    script: Script,
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        _credentials: &Credentials,
        sink: &dyn EventSink,
    ) -> Result<(), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reject => Err(TransportError::Rejected(401)),
            Script::StayOpen(events) => {
                sink.emit(sync_engine::ChannelEvent::Connected);
                for event in events {
                    sink.emit(sync_engine::ChannelEvent::Inbound(event.clone()));
                }
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

fn fast_settings() -> ChannelSettings {
    ChannelSettings {
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
        ..ChannelSettings::default()
    }
}

fn credentials() -> Option<Credentials> {
    Some(Credentials::new("tok", "ACME"))
}

fn started(job_id: &str) -> InboundEvent {
    InboundEvent::Started(JobStarted {
        job_id: job_id.to_string(),
        target_id: "T1".to_string(),
        target_name: "Acme".to_string(),
    })
}

fn progress(job_id: &str, progress: u8) -> InboundEvent {
    InboundEvent::Progress(JobProgressed {
        job_id: job_id.to_string(),
        progress,
        message: "working".to_string(),
    })
}

fn completed(job_id: &str) -> InboundEvent {
    InboundEvent::Completed(JobCompleted {
        job_id: job_id.to_string(),
        target_id: "T1".to_string(),
        posts_scraped: 4,
    })
}

fn client_with(script: Script) -> (ChannelClient, Arc<AtomicUsize>) {
    let opens = Arc::new(AtomicUsize::new(0));
    let transport = ScriptedTransport {
        opens: opens.clone(),
        script,
    };
    let client = ChannelClient::with_transport(fast_settings(), transport).expect("client");
    (client, opens)
}

fn recorder(log: &Log) -> HandlerSet {
    HandlerSet::new().with(Recorder { log: log.clone() })
}

fn pump_until(client: &mut ChannelClient, mut done: impl FnMut(&ChannelClient) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        client.dispatch_pending();
        if done(client) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out in state {:?}",
            client.state()
        );
        thread::sleep(Duration::from_millis(5));
    }
}

fn settle(client: &mut ChannelClient) {
    thread::sleep(Duration::from_millis(50));
    client.dispatch_pending();
}

#[test]
fn connect_without_credentials_is_a_silent_noop() {
    sync_logging::initialize_for_tests();
    let (mut client, opens) = client_with(Script::StayOpen(Vec::new()));
    let log: Log = Rc::default();

    client.connect(None, recorder(&log));
    settle(&mut client);

    assert_eq!(client.state(), ConnectionState::Idle);
    assert_eq!(client.handler_count(), 0);
    assert_eq!(opens.load(Ordering::SeqCst), 0);
}

#[test]
fn connect_while_connected_opens_nothing_new() {
    sync_logging::initialize_for_tests();
    let (mut client, opens) = client_with(Script::StayOpen(vec![started("J1")]));
    let log: Log = Rc::default();

    client.connect(credentials(), recorder(&log));
    pump_until(&mut client, |c| c.state() == ConnectionState::Connected);
    let epoch = client.epoch();

    client.connect(credentials(), recorder(&log));
    settle(&mut client);

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.handler_count(), 1);
    assert_eq!(client.epoch(), epoch);
    assert_eq!(*log.borrow(), vec!["connected", "started:J1"]);
}

#[test]
fn exhausted_retries_keep_reconnecting_state_until_rearmed() {
    sync_logging::initialize_for_tests();
    let (mut client, opens) = client_with(Script::Reject);
    let log: Log = Rc::default();

    client.connect(credentials(), recorder(&log));
    pump_until(&mut client, |_| log.borrow().iter().any(|l| l.starts_with("gave-up")));

    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert_eq!(opens.load(Ordering::SeqCst), 3);
    assert_eq!(*log.borrow(), vec!["error:0", "error:1", "error:2", "gave-up:2"]);

    // Parked: no further attempts on its own.
    settle(&mut client);
    assert_eq!(opens.load(Ordering::SeqCst), 3);

    log.borrow_mut().clear();
    client.connect(credentials(), HandlerSet::new());
    pump_until(&mut client, |_| log.borrow().iter().any(|l| l.starts_with("gave-up")));
    assert_eq!(opens.load(Ordering::SeqCst), 6);
    assert_eq!(client.handler_count(), 1);
}

#[test]
fn disconnect_closes_and_drops_handlers() {
    sync_logging::initialize_for_tests();
    let (mut client, _opens) = client_with(Script::StayOpen(vec![started("J1")]));
    let log: Log = Rc::default();

    client.connect(credentials(), recorder(&log));
    pump_until(&mut client, |c| c.state() == ConnectionState::Connected);
    client.disconnect();
    settle(&mut client);

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.handler_count(), 0);

    // A later connect starts a fresh connection with its own handlers.
    let fresh: Log = Rc::default();
    client.connect(credentials(), recorder(&fresh));
    pump_until(&mut client, |c| c.state() == ConnectionState::Connected);
    settle(&mut client);
    assert_eq!(*fresh.borrow(), vec!["connected", "started:J1"]);
}

struct DisconnectOnStart {
    control: ChannelControl,
    seen: Log,
}

impl EventHandler for DisconnectOnStart {
    fn on_started(&mut self, event: &JobStarted) {
        self.seen.borrow_mut().push(event.job_id.clone());
        self.control.request_disconnect();
    }
}

#[test]
fn handler_disconnect_requests_apply_after_dispatch() {
    sync_logging::initialize_for_tests();
    let (mut client, _opens) =
        client_with(Script::StayOpen(vec![started("J1"), started("J2")]));
    let seen: Log = Rc::default();
    let handlers = HandlerSet::new().with(DisconnectOnStart {
        control: client.control(),
        seen: seen.clone(),
    });

    client.connect(credentials(), handlers);
    pump_until(&mut client, |c| c.state() == ConnectionState::Closed);

    assert!(!seen.borrow().is_empty());
    assert_eq!(seen.borrow()[0], "J1");
}

/// Asks for one more retry round the first time reconnecting is given up.
struct RetryOnce {
    control: ChannelControl,
    log: Log,
}

impl EventHandler for RetryOnce {
    fn on_reconnect_failed(&mut self, attempts: u32) {
        let mut log = self.log.borrow_mut();
        log.push(format!("gave-up:{attempts}"));
        if log.len() == 1 {
            self.control.request_reconnect();
        }
    }
}

#[test]
fn handler_reconnect_request_rearms_after_dispatch() {
    sync_logging::initialize_for_tests();
    let (mut client, opens) = client_with(Script::Reject);
    let log: Log = Rc::default();
    let handlers = HandlerSet::new().with(RetryOnce {
        control: client.control(),
        log: log.clone(),
    });

    client.connect(credentials(), handlers);
    let first_epoch = client.epoch();
    pump_until(&mut client, |_| log.borrow().len() >= 2);
    settle(&mut client);

    assert_eq!(*log.borrow(), vec!["gave-up:2", "gave-up:2"]);
    assert_eq!(opens.load(Ordering::SeqCst), 6);
    assert_eq!(client.epoch(), first_epoch + 1);
    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert_eq!(client.handler_count(), 1);
}

#[test]
fn reconnect_request_is_ignored_while_connected() {
    sync_logging::initialize_for_tests();
    let (mut client, opens) = client_with(Script::StayOpen(Vec::new()));
    let log: Log = Rc::default();

    client.connect(credentials(), recorder(&log));
    pump_until(&mut client, |c| c.state() == ConnectionState::Connected);
    let epoch = client.epoch();

    client.control().request_reconnect();
    settle(&mut client);

    assert_eq!(client.epoch(), epoch);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Connected);
}

struct PanicsOnProgress {
    log: Log,
}

impl EventHandler for PanicsOnProgress {
    fn on_progress(&mut self, _event: &JobProgressed) {
        panic!("progress handler failed");
    }

    fn on_completed(&mut self, event: &JobCompleted) {
        self.log
            .borrow_mut()
            .push(format!("panicky:completed:{}", event.job_id));
    }
}

#[test]
fn panicking_handler_leaves_connection_and_other_handlers_intact() {
    sync_logging::initialize_for_tests();
    let (mut client, _opens) =
        client_with(Script::StayOpen(vec![progress("J1", 40), completed("J1")]));
    let log: Log = Rc::default();
    let handlers = HandlerSet::new()
        .with(PanicsOnProgress { log: log.clone() })
        .with(Recorder { log: log.clone() });

    client.connect(credentials(), handlers);
    pump_until(&mut client, |_| {
        log.borrow().iter().any(|l| l == "completed:J1")
    });

    assert_eq!(
        *log.borrow(),
        vec!["connected", "panicky:completed:J1", "completed:J1"]
    );
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.handler_count(), 2);
}

#[test]
fn sse_client_reconnects_after_server_closes_stream() {
    sync_logging::initialize_for_tests();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "event: scrape:started\ndata: {\"jobId\":\"J1\",\"targetId\":\"T1\",\"targetName\":\"Acme\"}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;
        server
    });

    let settings = ChannelSettings {
        retry_delay: Duration::from_millis(10),
        ..ChannelSettings::with_base_url(server.uri())
    };
    let mut client = ChannelClient::new(settings).unwrap();
    let log: Log = Rc::default();

    client.connect(credentials(), recorder(&log));
    pump_until(&mut client, |_| {
        log.borrow().iter().filter(|l| *l == "connected").count() >= 2
    });

    let log = log.borrow();
    assert_eq!(
        &log[..4],
        &["connected", "started:J1", "disconnected", "connected"]
    );
    client.disconnect();
}
