//! Sync engine: realtime channel transport, connection lifecycle and typed
//! event dispatch.
mod client;
mod dispatch;
mod frame;
mod state;
mod transport;
mod types;

pub use client::{ChannelClient, ChannelControl, ChannelError};
pub use dispatch::{EventHandler, HandlerSet};
pub use frame::{parse_frame, FrameDecoder, RawFrame, DEFAULT_SUBJECT, MAX_LINE_BYTES};
pub use state::{ConnectAction, ConnectionFsm};
pub use transport::{
    ChannelSettings, EventSink, SseTransport, Transport, TransportError, DEFAULT_BASE_URL,
    TENANT_HEADER,
};
pub use types::{ChannelEvent, ConnectionState, Credentials};
