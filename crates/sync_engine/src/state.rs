use crate::{ChannelEvent, ConnectionState};

/// What the client should do with a `connect` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Missing credentials or already live.
    Skip,
    /// Bind handlers and open a fresh transport.
    Open,
    /// Retries were exhausted; start a new retry round on the existing connection.
    Rearm,
}

/// Connection lifecycle as seen by the owner of a channel client.
///
/// Transitions are driven by owner requests (`connect`/`disconnect`) and by
/// the lifecycle signals the transport reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFsm {
    state: ConnectionState,
    retries: u32,
    exhausted: bool,
}

impl ConnectionFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// True between a successful `connect` and the matching `disconnect`.
    pub fn is_live(&self) -> bool {
        !matches!(self.state, ConnectionState::Idle | ConnectionState::Closed)
    }

    pub fn request_connect(&mut self, has_credentials: bool) -> ConnectAction {
        if !has_credentials {
            return ConnectAction::Skip;
        }
        match self.state {
            ConnectionState::Idle | ConnectionState::Closed => {
                self.state = ConnectionState::Connecting;
                self.retries = 0;
                self.exhausted = false;
                ConnectAction::Open
            }
            ConnectionState::Reconnecting if self.exhausted => {
                self.retries = 0;
                self.exhausted = false;
                ConnectAction::Rearm
            }
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => ConnectAction::Skip,
        }
    }

    /// Returns false when already closed.
    pub fn request_disconnect(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        self.retries = 0;
        self.exhausted = false;
        true
    }

    pub fn observe(&mut self, event: &ChannelEvent) {
        if !self.is_live() {
            return;
        }
        match event {
            ChannelEvent::Connected => {
                self.state = ConnectionState::Connected;
                self.retries = 0;
                self.exhausted = false;
            }
            ChannelEvent::Disconnected { .. } => {
                self.state = ConnectionState::Reconnecting;
            }
            ChannelEvent::ConnectionError { attempt, .. } => {
                self.state = ConnectionState::Reconnecting;
                self.retries = *attempt;
            }
            ChannelEvent::ReconnectFailed { attempts } => {
                self.state = ConnectionState::Reconnecting;
                self.retries = *attempts;
                self.exhausted = true;
            }
            ChannelEvent::Inbound(_) => {}
        }
    }
}
