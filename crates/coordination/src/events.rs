//! Live event fanout.
//!
//! Every state-changing operation appends one [`Event`] to the store and
//! publishes it here.  Subscribers ride a bounded broadcast channel; a
//! subscriber that cannot keep up loses the oldest events and the dropped
//! counter records how many.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Event;

/// Per-subscriber buffer depth.
pub const SUBSCRIBER_BUFFER: usize = 10;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish to live subscribers.  No subscribers is not an error.
    pub fn publish(&self, event: &Event) {
        let _ = self.tx.send(event.clone());
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
            dropped: self.dropped.clone(),
        }
    }

    /// Total events dropped across all subscribers since startup.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct EventSubscriber {
    rx: broadcast::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSubscriber {
    /// Next event, skipping over any dropped window (drop-oldest policy).
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped.fetch_add(n, Ordering::Relaxed);
                    debug!(dropped = n, "Event subscriber lagged, oldest events dropped");
                    // Continue with the oldest retained event.
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
