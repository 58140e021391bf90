use std::fmt;

use sync_core::InboundEvent;

/// Session credentials handed over by the authentication layer.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session_token: String,
    pub tenant_id: String,
}

impl Credentials {
    pub fn new(session_token: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("session_token", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Everything a handler can observe about a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Inbound(InboundEvent),
    /// Handshake acknowledged.
    Connected,
    /// The server ended an acknowledged stream.
    Disconnected { reason: String },
    /// A connection attempt failed. `attempt` is 0 for the first try after a
    /// healthy period and counts reconnection attempts after that.
    ConnectionError { message: String, attempt: u32 },
    /// Retries are used up; the connection waits for `connect` or `disconnect`.
    ReconnectFailed { attempts: u32 },
}

impl ChannelEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelEvent::Inbound(event) => event.subject(),
            ChannelEvent::Connected => "connected",
            ChannelEvent::Disconnected { .. } => "disconnected",
            ChannelEvent::ConnectionError { .. } => "connection-error",
            ChannelEvent::ReconnectFailed { .. } => "reconnect-failed",
        }
    }
}
