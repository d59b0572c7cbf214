use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifies one live peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a fresh connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Channel end used to hand a pre-encoded JSON frame to one connection's
/// writer task. The handoff never blocks; the actual socket write happens
/// on the connection's own task.
pub type PeerSender = mpsc::UnboundedSender<Arc<str>>;

/// Tracks which connections are subscribed to which document
///
/// The registry is the only shared mutable state in the collaboration core.
/// It holds non-owning delivery handles; the transport layer controls the
/// true lifetime of each connection, so entries are always removable without
/// the peer's cooperation.
pub struct SubscriberRegistry {
    /// Map of document ID to that document's current subscriber set
    subscribers: DashMap<String, HashMap<ConnectionId, PeerSender>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Add a connection to a document's subscriber set
    ///
    /// Idempotent per connection instance: re-joining the same connection to
    /// the same document is a no-op. A connection is bound to exactly one
    /// document for its lifetime; that binding is enforced by the connection
    /// lifecycle, not here.
    pub fn join(&self, doc_id: &str, connection_id: ConnectionId, sender: PeerSender) {
        self.subscribers
            .entry(doc_id.to_string())
            .or_default()
            .insert(connection_id, sender);

        debug!("Connection {} joined document '{}'", connection_id, doc_id);
    }

    /// Remove a connection from a document's subscriber set
    ///
    /// A no-op if the connection is not present, which covers the race
    /// between an explicit disconnect and a failure-triggered cleanup.
    /// Empty subscriber sets are garbage-collected.
    pub fn leave(&self, doc_id: &str, connection_id: ConnectionId) {
        let became_empty = match self.subscribers.get_mut(doc_id) {
            Some(mut set) => {
                if set.remove(&connection_id).is_some() {
                    debug!("Connection {} left document '{}'", connection_id, doc_id);
                }
                set.is_empty()
            }
            None => false,
        };

        if became_empty {
            self.subscribers.remove_if(doc_id, |_, set| set.is_empty());
        }
    }

    /// Point-in-time copy of a document's subscriber set
    ///
    /// Callers iterate the snapshot while membership may change concurrently;
    /// a peer that disconnects mid-iteration may or may not be offered the
    /// in-flight message. That is the documented best-effort delivery bound,
    /// traded for join/leave never blocking on deliveries.
    pub fn snapshot(&self, doc_id: &str) -> Vec<(ConnectionId, PeerSender)> {
        match self.subscribers.get(doc_id) {
            Some(set) => set.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Number of connections currently subscribed to a document
    pub fn subscriber_count(&self, doc_id: &str) -> usize {
        self.subscribers.get(doc_id).map_or(0, |set| set.len())
    }

    /// Number of documents with at least one subscriber
    pub fn document_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
