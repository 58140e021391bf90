use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use sync_logging::{sync_debug, sync_error, sync_info, sync_warn};
use tokio_util::sync::CancellationToken;

use crate::state::{ConnectAction, ConnectionFsm};
use crate::transport::{ChannelSettings, EventSink, SseTransport, Transport};
use crate::{ChannelEvent, ConnectionState, Credentials, HandlerSet};

type Epoch = u64;

enum WorkerCommand {
    Open { epoch: Epoch, credentials: Credentials },
    Close { epoch: Epoch },
}

enum ControlRequest {
    Disconnect,
    Reconnect,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to start channel worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Lets event handlers steer the connection without re-entering the client.
///
/// Requests are applied in order once the current dispatch batch has finished.
#[derive(Clone)]
pub struct ChannelControl {
    tx: mpsc::Sender<ControlRequest>,
}

impl ChannelControl {
    pub fn request_disconnect(&self) {
        let _ = self.tx.send(ControlRequest::Disconnect);
    }

    /// Starts a new retry round if the connection has given up reconnecting.
    /// Ignored in any other state.
    pub fn request_reconnect(&self) {
        let _ = self.tx.send(ControlRequest::Reconnect);
    }
}

/// Owner-side handle of the realtime channel.
///
/// The transport runs on a dedicated worker thread; events are queued and
/// delivered to handlers only when the owner calls
/// [`dispatch_pending`](Self::dispatch_pending), so all handler code runs on
/// the owner's thread, one event at a time.
pub struct ChannelClient {
    cmd_tx: mpsc::Sender<WorkerCommand>,
    event_rx: mpsc::Receiver<(Epoch, ChannelEvent)>,
    control_tx: mpsc::Sender<ControlRequest>,
    control_rx: mpsc::Receiver<ControlRequest>,
    fsm: ConnectionFsm,
    epoch: Epoch,
    handlers: HandlerSet,
    credentials: Option<Credentials>,
}

impl ChannelClient {
    /// Client backed by the SSE transport.
    pub fn new(settings: ChannelSettings) -> Result<Self, ChannelError> {
        let transport = SseTransport::new(settings.clone());
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(
        settings: ChannelSettings,
        transport: impl Transport + 'static,
    ) -> Result<Self, ChannelError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("sync-channel-rt")
            .enable_all()
            .build()?;
        thread::Builder::new()
            .name("sync-channel".to_string())
            .spawn(move || run_worker(runtime, transport, settings, cmd_rx, event_tx))?;

        Ok(Self {
            cmd_tx,
            event_rx,
            control_tx,
            control_rx,
            fsm: ConnectionFsm::new(),
            epoch: 0,
            handlers: HandlerSet::new(),
            credentials: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    /// Consecutive failed reconnection attempts reported by the transport.
    pub fn retries(&self) -> u32 {
        self.fsm.retries()
    }

    /// Identifies the current connection; bumped every time a transport is opened.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn control(&self) -> ChannelControl {
        ChannelControl {
            tx: self.control_tx.clone(),
        }
    }

    /// Opens the channel and binds `handlers` to it.
    ///
    /// Without credentials, or while a connection is already live, this does
    /// nothing and `handlers` is dropped. After retries were exhausted it
    /// starts a new retry round and keeps the handlers already bound.
    pub fn connect(&mut self, credentials: Option<Credentials>, handlers: HandlerSet) {
        let action = self.fsm.request_connect(credentials.is_some());
        let Some(credentials) = credentials else {
            sync_debug!("connect skipped: no session credentials");
            return;
        };
        match action {
            ConnectAction::Skip => {
                sync_debug!("connect ignored: channel is {:?}", self.fsm.state());
            }
            ConnectAction::Open => {
                self.handlers = handlers;
                self.open(credentials);
            }
            ConnectAction::Rearm => self.rearm(credentials),
        }
    }

    /// Tears the connection down and drops its handlers. Queued events of the
    /// closed connection are discarded.
    pub fn disconnect(&mut self) {
        if !self.fsm.request_disconnect() {
            return;
        }
        sync_info!("closing channel epoch {}", self.epoch);
        self.send(WorkerCommand::Close { epoch: self.epoch });
        self.handlers = HandlerSet::new();
        self.credentials = None;
        while self.event_rx.try_recv().is_ok() {}
    }

    /// Delivers every queued event to the bound handlers, then applies any
    /// control requests they made. Returns the number of events delivered.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        sync_logging::set_connection_epoch(self.epoch);
        while let Ok((epoch, event)) = self.event_rx.try_recv() {
            if epoch != self.epoch || !self.fsm.is_live() {
                continue;
            }
            self.fsm.observe(&event);
            log_lifecycle(&event);
            self.handlers.dispatch(&event);
            delivered += 1;
        }
        sync_logging::set_connection_epoch(0);
        self.apply_control_requests();
        delivered
    }

    fn apply_control_requests(&mut self) {
        while let Ok(request) = self.control_rx.try_recv() {
            match request {
                ControlRequest::Disconnect => self.disconnect(),
                ControlRequest::Reconnect => self.rearm_if_exhausted(),
            }
        }
    }

    fn rearm_if_exhausted(&mut self) {
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        if !self.fsm.is_exhausted() {
            sync_debug!("reconnect request ignored: channel is {:?}", self.fsm.state());
            return;
        }
        if self.fsm.request_connect(true) == ConnectAction::Rearm {
            self.rearm(credentials);
        }
    }

    fn rearm(&mut self, credentials: Credentials) {
        sync_info!("re-arming channel after exhausted retries");
        self.send(WorkerCommand::Close { epoch: self.epoch });
        self.open(credentials);
    }

    fn open(&mut self, credentials: Credentials) {
        self.epoch += 1;
        sync_info!(
            "opening channel epoch {} for tenant {}",
            self.epoch,
            credentials.tenant_id
        );
        self.credentials = Some(credentials.clone());
        self.send(WorkerCommand::Open {
            epoch: self.epoch,
            credentials,
        });
    }

    fn send(&self, command: WorkerCommand) {
        if self.cmd_tx.send(command).is_err() {
            sync_error!("channel worker has stopped");
        }
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        // Dropping `cmd_tx` afterwards stops the worker thread.
        self.disconnect();
    }
}

fn log_lifecycle(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected => sync_info!("channel connected"),
        ChannelEvent::Disconnected { reason } => sync_warn!("channel dropped: {}", reason),
        ChannelEvent::ConnectionError { message, attempt } => {
            sync_warn!("channel error (attempt {}): {}", attempt, message)
        }
        ChannelEvent::ReconnectFailed { attempts } => {
            sync_error!("channel gave up after {} reconnection attempts", attempts)
        }
        ChannelEvent::Inbound(inbound) => sync_debug!("inbound {}", inbound.subject()),
    }
}

fn run_worker(
    runtime: tokio::runtime::Runtime,
    transport: Arc<dyn Transport>,
    settings: ChannelSettings,
    cmd_rx: mpsc::Receiver<WorkerCommand>,
    event_tx: mpsc::Sender<(Epoch, ChannelEvent)>,
) {
    let mut live: HashMap<Epoch, CancellationToken> = HashMap::new();
    while let Ok(command) = cmd_rx.recv() {
        match command {
            WorkerCommand::Open { epoch, credentials } => {
                let cancel = CancellationToken::new();
                live.insert(epoch, cancel.clone());
                let transport = transport.clone();
                let settings = settings.clone();
                let sink = EpochSink::new(epoch, event_tx.clone());
                runtime.spawn(async move {
                    run_connection(transport.as_ref(), &credentials, &settings, &sink, cancel)
                        .await;
                });
            }
            WorkerCommand::Close { epoch } => {
                if let Some(cancel) = live.remove(&epoch) {
                    cancel.cancel();
                }
            }
        }
    }
    for cancel in live.values() {
        cancel.cancel();
    }
    runtime.shutdown_background();
}

/// Keeps one connection alive until cancelled.
///
/// After a drop or a failed attempt it waits `retry_delay` and tries again;
/// once `max_retries` reconnection attempts in a row have failed it reports
/// `ReconnectFailed` and parks until cancelled.
async fn run_connection(
    transport: &dyn Transport,
    credentials: &Credentials,
    settings: &ChannelSettings,
    sink: &EpochSink,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        sink.reset_handshake();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = transport.open(credentials, sink) => outcome,
        };
        if sink.handshake_seen() {
            attempt = 0;
        }
        match outcome {
            Ok(()) => sink.emit(ChannelEvent::Disconnected {
                reason: "stream closed by server".to_string(),
            }),
            Err(err) => sink.emit(ChannelEvent::ConnectionError {
                message: err.to_string(),
                attempt,
            }),
        }
        if attempt >= settings.max_retries && !sink.handshake_seen() {
            sink.emit(ChannelEvent::ReconnectFailed { attempts: attempt });
            cancel.cancelled().await;
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(settings.retry_delay) => {}
        }
        attempt += 1;
    }
}

struct EpochSink {
    epoch: Epoch,
    tx: mpsc::Sender<(Epoch, ChannelEvent)>,
    handshake: AtomicBool,
}

impl EpochSink {
    fn new(epoch: Epoch, tx: mpsc::Sender<(Epoch, ChannelEvent)>) -> Self {
        Self {
            epoch,
            tx,
            handshake: AtomicBool::new(false),
        }
    }

    fn reset_handshake(&self) {
        self.handshake.store(false, Ordering::Relaxed);
    }

    fn handshake_seen(&self) -> bool {
        self.handshake.load(Ordering::Relaxed)
    }
}

impl EventSink for EpochSink {
    fn emit(&self, event: ChannelEvent) {
        if matches!(event, ChannelEvent::Connected) {
            self.handshake.store(true, Ordering::Relaxed);
        }
        let _ = self.tx.send((self.epoch, event));
    }
}
