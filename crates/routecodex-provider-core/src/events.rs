use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

/// Anything that wants to durably react to events emitted on an
/// [`EventHub`] (e.g. the NDJSON error log sink in `routecodex-storage`).
pub trait EventSink<E>: Send + Sync {
    fn write<'a>(&'a self, event: &'a E) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// A broadcast hub generic over the event payload type, grounded on the
/// reference proxy's `gproxy_provider_core::events::EventHub` shape: a
/// `tokio::sync::broadcast` channel for live subscribers (e.g. an admin
/// stream) plus a list of async sinks that always see every event
/// regardless of subscriber backpressure.
pub struct EventHub<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for EventHub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<E> {
    tx: broadcast::Sender<E>,
    sinks: RwLock<Vec<Arc<dyn EventSink<E>>>>,
}

impl<E: Clone + Send + Sync + 'static> EventHub<E> {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            inner: Arc::new(Inner {
                tx,
                sinks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.inner.tx.subscribe()
    }

    pub async fn add_sink(&self, sink: Arc<dyn EventSink<E>>) {
        self.inner.sinks.write().await.push(sink);
    }

    pub async fn emit(&self, event: E) {
        let _ = self.inner.tx.send(event.clone());
        let sinks = self.inner.sinks.read().await.clone();
        for sink in sinks {
            sink.write(&event).await;
        }
    }
}
