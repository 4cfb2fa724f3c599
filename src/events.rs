//! Event channels (spec §6, §9).
//!
//! Spec §9 calls for "replace observer registrations with a bounded set of
//! event channels... components subscribe to; drop subscriptions at
//! teardown". `tokio::sync::broadcast` gives exactly that: any number of
//! subscribers, each with its own bounded queue, dropped when the
//! receiver is dropped — no observer-list cleanup to forget.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::Collection;

/// Payload for `sync-completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncCompletedPayload {
    pub new_failures: usize,
    pub total_failures: usize,
}

/// Payload for `sync-operations-failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncFailedPayload {
    pub count: usize,
}

/// Payload for `sync-conflict-detected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPayload {
    pub collection: Collection,
    pub document_id: String,
}

/// One event per name in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PendingSync,
    SyncCompleted(SyncCompletedPayload),
    SyncOperationsFailed(SyncFailedPayload),
    SyncConflictDetected(ConflictPayload),
    DatabaseRecovered,
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A cloneable handle for publishing events; subscribe with `.subscribe()`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Silently dropped if nobody is subscribed —
    /// mirrors fire-and-forget notification semantics in the spec.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
