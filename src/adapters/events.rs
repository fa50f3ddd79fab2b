//! In-process content lifecycle channel.
//!
//! The content service emits insert/update/replace/delete notifications; the
//! index registers as an observer by subscribing. Each subscriber receives
//! every event at most once, in emission order.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::ContentEvent;

/// Fan-out channel for content lifecycle events
#[derive(Debug, Default)]
pub struct ContentEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ContentEvent>>>,
}

impl ContentEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ContentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(e) => warn!("Content event bus poisoned, subscriber not registered: {}", e),
        }
        rx
    }

    /// Deliver an event to every live subscriber, returning how many received it
    pub fn emit(&self, event: ContentEvent) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            warn!(action = event.action(), "Content event bus poisoned, event dropped");
            return 0;
        };

        // Subscribers whose receiver is gone are dropped
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(action = event.action(), delivered = subscribers.len(), "Emitted content event");
        subscribers.len()
    }

    /// Stop delivery; subscribers drain what they already received
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
