//! Server-Sent Events over reqwest.

use std::collections::VecDeque;

use factory_shared::TransportError;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, RequestBuilder};

use super::{SseMessage, Transport, TransportEvent};

const DEFAULT_EVENT: &str = "message";

/// Longest unterminated line the decoder will hold before giving up.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` parser.
///
/// Bytes may be fed in arbitrary chunks; a frame is emitted at each blank
/// line that follows at least one `data:` line.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            max_line,
        }
    }

    /// Decode every complete line in `chunk`. Fails once the pending
    /// partial line grows past the limit; the decoder is unusable after that.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseMessage>, TransportError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_idx) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_idx).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            return Err(TransportError::Body(format!(
                "event stream line exceeds {} bytes",
                self.max_line
            )));
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry and unknown fields carry nothing we use
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseMessage {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

/// [`Transport`] backed by a streaming HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct SseTransport {
    client: Client,
}

impl SseTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for SseTransport {
    fn connect(&self, url: &str) -> BoxStream<'static, TransportEvent> {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        stream::unfold(ConnectState::Connecting(request), next_event).boxed()
    }
}

enum ConnectState {
    Connecting(RequestBuilder),
    Streaming {
        body: BoxStream<'static, Result<Vec<u8>, String>>,
        decoder: SseDecoder,
        pending: VecDeque<SseMessage>,
    },
    Done,
}

async fn next_event(state: ConnectState) -> Option<(TransportEvent, ConnectState)> {
    match state {
        ConnectState::Connecting(request) => match request.send().await {
            Ok(response) if response.status().is_success() => {
                let body = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(|e| e.to_string()))
                    .boxed();
                let streaming = ConnectState::Streaming {
                    body,
                    decoder: SseDecoder::new(),
                    pending: VecDeque::new(),
                };
                Some((TransportEvent::Open, streaming))
            }
            Ok(response) => {
                let status = response.status().as_u16();
                Some((
                    TransportEvent::Error(TransportError::Status(status)),
                    ConnectState::Done,
                ))
            }
            Err(e) => Some((
                TransportEvent::Error(TransportError::Request(e.to_string())),
                ConnectState::Done,
            )),
        },
        ConnectState::Streaming {
            mut body,
            mut decoder,
            mut pending,
        } => loop {
            if let Some(message) = pending.pop_front() {
                let streaming = ConnectState::Streaming {
                    body,
                    decoder,
                    pending,
                };
                return Some((TransportEvent::Message(message), streaming));
            }
            match body.next().await {
                Some(Ok(chunk)) => match decoder.feed(&chunk) {
                    Ok(frames) => pending.extend(frames),
                    Err(err) => return Some((TransportEvent::Error(err), ConnectState::Done)),
                },
                Some(Err(e)) => {
                    return Some((
                        TransportEvent::Error(TransportError::Body(e)),
                        ConnectState::Done,
                    ))
                }
                None => return None,
            }
        },
        ConnectState::Done => None,
    }
}
