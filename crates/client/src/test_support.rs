use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use factory_shared::{ApiError, TransportError, WorkspaceEntry};
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::Semaphore;

use crate::api_client::WorkspaceSource;
use crate::transport::{SseMessage, Transport, TransportEvent};

/// Let spawned tasks run without moving the (paused) clock.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Transport whose connections are driven by the test.
#[derive(Default)]
pub(crate) struct FakeTransport {
    connections: Mutex<Vec<FakeConnection>>,
}

#[derive(Clone)]
pub(crate) struct FakeConnection {
    pub(crate) url: String,
    sender: UnboundedSender<TransportEvent>,
    closes: Arc<AtomicUsize>,
}

struct CloseGuard(Arc<AtomicUsize>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub(crate) fn connection(&self, index: usize) -> FakeConnection {
        self.connections.lock().unwrap()[index].clone()
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.is_closed())
            .count()
    }
}

impl Transport for FakeTransport {
    fn connect(&self, url: &str) -> BoxStream<'static, TransportEvent> {
        let (sender, receiver) = unbounded();
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = CloseGuard(closes.clone());
        self.connections.lock().unwrap().push(FakeConnection {
            url: url.to_string(),
            sender,
            closes,
        });
        receiver
            .map(move |event| {
                let _open = &guard;
                event
            })
            .boxed()
    }
}

impl FakeConnection {
    pub(crate) fn open(&self) {
        let _ = self.sender.unbounded_send(TransportEvent::Open);
    }

    pub(crate) fn message(&self, event: &str, data: &str) {
        let _ = self
            .sender
            .unbounded_send(TransportEvent::Message(SseMessage::new(event, data)));
    }

    pub(crate) fn fail(&self) {
        let _ = self.sender.unbounded_send(TransportEvent::Error(TransportError::Request(
            "connection refused".to_string(),
        )));
    }

    /// End the stream without an error event.
    pub(crate) fn end(&self) {
        self.sender.close_channel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Workspace source with scripted answers and an optional gate that holds
/// every call in flight until the test releases it.
#[derive(Default)]
pub(crate) struct FakeSource {
    calls: AtomicUsize,
    responses: Mutex<VecDeque<Result<Vec<WorkspaceEntry>, ApiError>>>,
    gate: Option<Semaphore>,
}

impl FakeSource {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub(crate) fn push_ok(&self, names: &[&str]) {
        let list = names.iter().map(|name| WorkspaceEntry::new(*name)).collect();
        self.responses.lock().unwrap().push_back(Ok(list));
    }

    pub(crate) fn push_err(&self, err: ApiError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }
}

#[async_trait]
impl WorkspaceSource for FakeSource {
    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceEntry>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub(crate) fn names(list: &[WorkspaceEntry]) -> Vec<&str> {
    list.iter().map(|entry| entry.name.as_str()).collect()
}
