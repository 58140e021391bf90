use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;

use crate::frame::{parse_frame, FrameDecoder};
use crate::{ChannelEvent, Credentials};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const TENANT_HEADER: &str = "X-Tenant-Id";

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub base_url: String,
    pub events_path: String,
    /// Consecutive failed reconnection attempts before giving up.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    /// Longest silence tolerated on an open stream. Keep it above the
    /// server's heartbeat interval.
    pub idle_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            events_path: "/events".to_string(),
            max_retries: 5,
            retry_delay: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(45),
        }
    }
}

impl ChannelSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn events_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.events_path.starts_with('/') {
            format!("{base}{}", self.events_path)
        } else {
            format!("{base}/{}", self.events_path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid channel url: {0}")]
    InvalidUrl(String),
    #[error("handshake rejected with status {0}")]
    Rejected(u16),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ChannelEvent);
}

/// One connection attempt.
///
/// Implementations emit [`ChannelEvent::Connected`] once the handshake is
/// acknowledged, then forward inbound events until the stream ends.
/// `Ok(())` means the server closed an acknowledged stream.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(
        &self,
        credentials: &Credentials,
        sink: &dyn EventSink,
    ) -> Result<(), TransportError>;
}

/// Server-sent events over a long-lived HTTP GET.
#[derive(Debug, Clone)]
pub struct SseTransport {
    settings: ChannelSettings,
}

impl SseTransport {
    pub fn new(settings: ChannelSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        // No overall request timeout: the stream is meant to stay open.
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        credentials: &Credentials,
        sink: &dyn EventSink,
    ) -> Result<(), TransportError> {
        let url = reqwest::Url::parse(&self.settings.events_url())
            .map_err(|err| TransportError::InvalidUrl(err.to_string()))?;
        let client = self.build_client()?;

        let response = client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .bearer_auth(&credentials.session_token)
            .header(TENANT_HEADER, credentials.tenant_id.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(status.as_u16()));
        }
        sink.emit(ChannelEvent::Connected);

        let mut decoder = FrameDecoder::new();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(self.settings.idle_timeout, stream.next())
                .await
                .map_err(|_| {
                    TransportError::Timeout(format!(
                        "no data for {}s",
                        self.settings.idle_timeout.as_secs_f32()
                    ))
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(map_reqwest_error)?;
            for frame in decoder.feed(&chunk) {
                if let Some(event) = parse_frame(&frame) {
                    sink.emit(ChannelEvent::Inbound(event));
                }
            }
        }
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(err.to_string());
    }
    TransportError::Network(err.to_string())
}
