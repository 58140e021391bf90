use bytes::BytesMut;
use serde::Deserialize;
use sync_core::InboundEvent;
use sync_logging::{sync_debug, sync_warn};

/// Subject used by frames without an `event:` line.
pub const DEFAULT_SUBJECT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub subject: String,
    pub data: String,
    pub id: Option<String>,
}

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split at arbitrary points; complete frames are returned
/// as soon as their terminating blank line has been seen. A line longer than
/// the limit is dropped together with the frame it belongs to.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    discarding: bool,
    skipping_frame: bool,
    subject: Option<String>,
    data: String,
    has_data: bool,
    id: Option<String>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line,
            discarding: false,
            skipping_frame: false,
            subject: None,
            data: String::new(),
            has_data: false,
            id: None,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let raw = self.buf.split_to(pos + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let mut line = &raw[..pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_line {
            sync_warn!(
                "dropping event-stream line longer than {} bytes",
                self.max_line
            );
            self.buf.clear();
            self.scanned = 0;
            self.discarding = true;
            self.skipping_frame = true;
            self.reset_frame();
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if self.skipping_frame {
            self.skipping_frame = !line.is_empty();
            return None;
        }
        if line.is_empty() {
            return self.flush();
        }
        // Comment lines double as keep-alive heartbeats.
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.subject = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn reset_frame(&mut self) {
        self.subject = None;
        self.id = None;
        self.data.clear();
        self.has_data = false;
    }

    fn flush(&mut self) -> Option<RawFrame> {
        let subject = self.subject.take();
        let id = self.id.take();
        if !std::mem::take(&mut self.has_data) {
            return None;
        }
        Some(RawFrame {
            subject: subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            data: std::mem::take(&mut self.data),
            id,
        })
    }
}

/// `{"subject": ..., "payload": {...}}`, used by servers that only emit
/// unnamed frames.
#[derive(Debug, Deserialize)]
struct Envelope {
    subject: String,
    payload: serde_json::Value,
}

/// Turns a frame into a typed event. Unknown subjects and malformed payloads
/// are logged and dropped.
pub fn parse_frame(frame: &RawFrame) -> Option<InboundEvent> {
    let parsed = if frame.subject == DEFAULT_SUBJECT {
        match serde_json::from_str::<Envelope>(&frame.data) {
            Ok(envelope) => InboundEvent::parse(&envelope.subject, &envelope.payload.to_string()),
            Err(err) => {
                sync_debug!("ignoring unnamed frame without envelope: {}", err);
                return None;
            }
        }
    } else {
        InboundEvent::parse(&frame.subject, &frame.data)
    };

    match parsed {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            sync_debug!("ignoring unrecognized subject {}", frame.subject);
            None
        }
        Err(err) => {
            sync_warn!("dropping inbound event: {}", err);
            None
        }
    }
}
