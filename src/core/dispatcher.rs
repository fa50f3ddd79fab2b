//! Ordered event dispatch.
//!
//! Every content node gets a FIFO lane keyed by `(course_id, content_id)`.
//! Events on the same lane are applied one after another in arrival order;
//! different lanes run concurrently. A lane exists only while it has work,
//! so idle nodes cost nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Notify};
use tracing::{error, info, instrument, warn};

use super::reconciler::Reconciler;
use crate::domain::{ContentEvent, NodeKey};

/// Routes content events to per-node lanes
pub struct EventDispatcher {
    reconciler: Arc<Reconciler>,
    lanes: Mutex<HashMap<NodeKey, VecDeque<ContentEvent>>>,
    idle: Notify,
}

impl EventDispatcher {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            lanes: Mutex::new(HashMap::new()),
            idle: Notify::new(),
        }
    }

    /// Queue an event behind any earlier events for the same node.
    ///
    /// Events without usable identifiers are reported and dropped.
    #[instrument(skip(self, event), fields(action = event.action()))]
    pub fn dispatch(self: &Arc<Self>, event: ContentEvent) {
        let Some(key) = event.lane_key() else {
            error!(code = "INVALID_DATA", "Dropping content event without _id/_courseId");
            return;
        };

        let start_lane = {
            let mut lanes = self.lock_lanes();
            match lanes.get_mut(&key) {
                Some(queue) => {
                    queue.push_back(event);
                    false
                }
                None => {
                    lanes.insert(key.clone(), VecDeque::from([event]));
                    true
                }
            }
        };

        if start_lane {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drain(key).await });
        }
    }

    /// Number of nodes with queued or running events
    pub fn active_lanes(&self) -> usize {
        self.lock_lanes().len()
    }

    /// Resolve once every lane has drained
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active_lanes() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Consume a bus subscription until it closes, then wait for the lanes
    pub async fn listen(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<ContentEvent>) {
        info!("Listening for content events");
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        self.wait_idle().await;
        info!("Content event stream closed");
    }

    async fn drain(self: Arc<Self>, key: NodeKey) {
        while let Some(event) = self.next_event(&key) {
            let reconciler = Arc::clone(&self.reconciler);
            let action = event.action();

            // Run in its own task so a panicking handler cannot wedge the lane
            let handled = tokio::spawn(async move { reconciler.apply(&event).await }).await;

            match handled {
                Ok(Ok(report)) if report.is_clean() => {}
                Ok(Ok(report)) => warn!(
                    node = %key,
                    action,
                    failed = report.failures.len(),
                    "Content event applied with failed references"
                ),
                Ok(Err(e)) => error!(node = %key, action, code = e.code(), "Content event failed: {}", e),
                Err(e) => error!(node = %key, action, "Content event handler crashed: {}", e),
            }
        }
    }

    fn next_event(&self, key: &NodeKey) -> Option<ContentEvent> {
        let mut lanes = self.lock_lanes();
        if let Some(event) = lanes.get_mut(key).and_then(VecDeque::pop_front) {
            return Some(event);
        }

        lanes.remove(key);
        if lanes.is_empty() {
            self.idle.notify_waiters();
        }
        None
    }

    // Lane bookkeeping never panics while holding the lock, so a poisoned
    // map is still consistent.
    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<NodeKey, VecDeque<ContentEvent>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
