use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::SubscriberRegistry;
use crate::protocol::{encode_message, ServerMessage};

/// Fans a message out to every current subscriber of a document
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Deliver `message` to every connection currently subscribed to `doc_id`
    ///
    /// The message is serialized exactly once; every peer receives identical
    /// bytes. Each delivery is an independent channel handoff to that
    /// connection's writer task, so a slow or dead peer never delays the
    /// others. A failed handoff means the peer's writer task is gone; the
    /// connection is evicted from the registry so membership self-heals.
    ///
    /// Returns the number of successful handoffs. No acknowledgment or
    /// cross-peer ordering is promised beyond one delivery attempt per
    /// currently-known subscriber.
    pub fn broadcast(&self, doc_id: &str, message: &ServerMessage) -> crate::RealdocResult<usize> {
        let frame: Arc<str> = encode_message(message)?.into();

        let snapshot = self.registry.snapshot(doc_id);
        let mut delivered = 0;

        for (connection_id, sender) in snapshot {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(
                    "Evicting dead connection {} from document '{}' after failed delivery",
                    connection_id, doc_id
                );
                self.registry.leave(doc_id, connection_id);
            }
        }

        debug!(
            "Broadcast to document '{}' reached {} subscriber(s)",
            doc_id, delivered
        );
        Ok(delivered)
    }
}
