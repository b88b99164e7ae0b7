//! Event types for the fieldops event system
//!
//! Downstream consumers (views, notification surfaces) subscribe to the
//! EventBus; the reconciliation engine is the only producer. Events fire only
//! on genuine content changes, so subscribers never see no-op refreshes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Fieldops event types
///
/// Events are broadcast via [`EventBus`] and can be serialized for relaying
/// to an embedding UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldEvent {
    /// Canonical account collection was replaced with new content
    AccountsUpdated {
        /// Number of accounts after the replacement
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Canonical assignment collection was replaced with new content
    AssignmentsUpdated {
        /// Number of assignments after the replacement
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The number of visible assignments strictly increased between two
    /// observed snapshots (never fired off the first snapshot)
    AssignmentPosted {
        visible_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The top-ranked non-admin, non-paused account changed
    LeaderChanged {
        username: String,
        timestamp: DateTime<Utc>,
    },

    /// The bound session account was re-bound to refreshed content
    SessionRebound {
        username: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Backed by `tokio::broadcast`: non-blocking publish, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FieldEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events. Events emitted before subscription are
    /// not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FieldEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers. Having no subscribers is not an error.
    pub fn emit(&self, event: FieldEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
