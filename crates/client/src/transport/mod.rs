//! Server-push transports.
//!
//! A transport turns a URL into a stream of [`TransportEvent`]s. The stream
//! is the connection: dropping it closes the underlying request. Stores
//! never see transport errors as `Err`, only as events that move their
//! connection status.

mod sse;

use std::sync::Arc;

use factory_shared::TransportError;
use futures_util::stream::BoxStream;
use once_cell::sync::Lazy;

pub use sse::{SseDecoder, SseTransport};

/// One named message from a push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Event name, `message` when the server did not set one.
    pub event: String,
    pub data: String,
}

impl SseMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The server accepted the connection.
    Open,
    Message(SseMessage),
    /// The connection failed or dropped. Nothing follows an error.
    Error(TransportError),
}

/// Opens push connections.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxStream<'static, TransportEvent>;
}

static DEFAULT_TRANSPORT: Lazy<Arc<SseTransport>> = Lazy::new(|| Arc::new(SseTransport::new()));

/// SSE transport shared by the default stores, one reqwest pool for all.
pub fn default_transport() -> Arc<dyn Transport> {
    DEFAULT_TRANSPORT.clone()
}
