use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use sync_core::{
    EntityAdded, EntityProfileReady, EntitySyncFailed, InboundEvent, JobCompleted, JobFailed,
    JobProgressed, JobScheduled, JobStarted,
};
use sync_logging::sync_error;

use crate::ChannelEvent;

/// Receiver of channel events.
///
/// Every method defaults to a no-op so a handler only overrides what it cares
/// about. `on_inbound` fans out to the per-subject methods; override it to see
/// every inbound event in one place.
///
/// Handlers run on the thread that calls
/// [`ChannelClient::dispatch_pending`](crate::ChannelClient::dispatch_pending)
/// and must not try to connect or disconnect the client from inside a
/// callback; use a [`ChannelControl`](crate::ChannelControl) instead.
pub trait EventHandler {
    fn on_inbound(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::Scheduled(e) => self.on_scheduled(e),
            InboundEvent::Started(e) => self.on_started(e),
            InboundEvent::Progress(e) => self.on_progress(e),
            InboundEvent::Completed(e) => self.on_completed(e),
            InboundEvent::Failed(e) => self.on_failed(e),
            InboundEvent::Added(e) => self.on_added(e),
            InboundEvent::ProfileReady(e) => self.on_profile_ready(e),
            InboundEvent::SyncFailed(e) => self.on_sync_failed(e),
        }
    }

    fn on_scheduled(&mut self, _event: &JobScheduled) {}
    fn on_started(&mut self, _event: &JobStarted) {}
    fn on_progress(&mut self, _event: &JobProgressed) {}
    fn on_completed(&mut self, _event: &JobCompleted) {}
    fn on_failed(&mut self, _event: &JobFailed) {}
    fn on_added(&mut self, _event: &EntityAdded) {}
    fn on_profile_ready(&mut self, _event: &EntityProfileReady) {}
    fn on_sync_failed(&mut self, _event: &EntitySyncFailed) {}

    fn on_connected(&mut self) {}
    fn on_disconnected(&mut self, _reason: &str) {}
    fn on_connection_error(&mut self, _message: &str, _attempt: u32) {}
    fn on_reconnect_failed(&mut self, _attempts: u32) {}
}

/// Ordered list of handlers bound to one connection.
#[derive(Default)]
pub struct HandlerSet {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.push(handler);
        self
    }

    pub fn push(&mut self, handler: impl EventHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Delivers `event` to every handler in registration order.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    /// Returns the number of handlers that panicked.
    pub fn dispatch(&mut self, event: &ChannelEvent) -> usize {
        let mut failures = 0;
        for (index, handler) in self.handlers.iter_mut().enumerate() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| deliver(handler.as_mut(), event)));
            if let Err(payload) = outcome {
                failures += 1;
                sync_error!(
                    "handler #{} panicked on {}: {}",
                    index,
                    event.label(),
                    panic_message(payload.as_ref())
                );
            }
        }
        failures
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("len", &self.handlers.len())
            .finish()
    }
}

fn deliver(handler: &mut dyn EventHandler, event: &ChannelEvent) {
    match event {
        ChannelEvent::Inbound(inbound) => handler.on_inbound(inbound),
        ChannelEvent::Connected => handler.on_connected(),
        ChannelEvent::Disconnected { reason } => handler.on_disconnected(reason),
        ChannelEvent::ConnectionError { message, attempt } => {
            handler.on_connection_error(message, *attempt)
        }
        ChannelEvent::ReconnectFailed { attempts } => handler.on_reconnect_failed(*attempts),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
