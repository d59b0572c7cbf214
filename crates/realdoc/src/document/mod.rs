use std::sync::Arc;

use tracing::{debug, info};

use crate::protocol::ServerMessage;
use crate::session::Broadcaster;
use crate::storage::DocumentStorage;

/// Coordinates durable writes with subscriber notification
///
/// The one ordering this service guarantees: for a single call, subscribers
/// are notified only after the storage write is acknowledged. Across calls
/// racing on the same document, each commit-then-broadcast pair is sequenced
/// on its own; broadcasts may be observed in a different order than the
/// commits landed. The storage layer is last-write-wins, so that weaker
/// bound is deliberate and documented rather than papered over.
pub struct DocumentService {
    storage: Arc<dyn DocumentStorage>,
    broadcaster: Broadcaster,
}

impl DocumentService {
    /// Create a service over the given storage and broadcaster
    pub fn new(storage: Arc<dyn DocumentStorage>, broadcaster: Broadcaster) -> Self {
        Self {
            storage,
            broadcaster,
        }
    }

    /// Get the broadcaster
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Persist new content for a document, then notify its subscribers
    ///
    /// On a storage failure the error is returned to the caller, nothing is
    /// broadcast, and the registry is untouched. There is no retry. The
    /// saving peer's own connection, if subscribed, receives the update like
    /// everyone else.
    pub async fn save_and_notify(&self, doc_id: &str, content: &str) -> crate::RealdocResult<()> {
        self.storage.upsert(doc_id, content).await?;

        let delivered = self.broadcaster.broadcast(
            doc_id,
            &ServerMessage::ContentUpdate {
                content: content.to_string(),
            },
        )?;

        debug!(
            "Saved document '{}' and notified {} subscriber(s)",
            doc_id, delivered
        );
        Ok(())
    }

    /// Fetch a document's content, creating it empty if unknown
    ///
    /// Reading an unknown document is not an error; it lazily becomes an
    /// empty document. No broadcast side effect.
    pub async fn fetch_or_create(&self, doc_id: &str) -> crate::RealdocResult<String> {
        match self.storage.get(doc_id).await? {
            Some(content) => Ok(content),
            None => {
                info!("Document '{}' not found, creating empty", doc_id);
                self.storage.ensure_created(doc_id).await?;
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::session::{ConnectionLifecycle, SubscriberRegistry};
    use crate::storage::MemoryStorage;
    use crate::{RealdocError, RealdocResult};

    /// Storage that fails every write, for persist-then-notify ordering tests
    struct FailingStorage;

    #[async_trait]
    impl DocumentStorage for FailingStorage {
        async fn get(&self, _doc_id: &str) -> RealdocResult<Option<String>> {
            Err(RealdocError::Storage("backend down".to_string()))
        }

        async fn upsert(&self, _doc_id: &str, _content: &str) -> RealdocResult<()> {
            Err(RealdocError::Storage("backend down".to_string()))
        }

        async fn ensure_created(&self, _doc_id: &str) -> RealdocResult<()> {
            Err(RealdocError::Storage("backend down".to_string()))
        }
    }

    fn service_with(storage: Arc<dyn DocumentStorage>) -> (Arc<SubscriberRegistry>, DocumentService) {
        let registry = Arc::new(SubscriberRegistry::new());
        let service = DocumentService::new(storage, Broadcaster::new(registry.clone()));
        (registry, service)
    }

    fn memory_service() -> (Arc<SubscriberRegistry>, DocumentService) {
        service_with(Arc::new(MemoryStorage::new()))
    }

    fn connect_peer(
        registry: &Arc<SubscriberRegistry>,
        doc_id: &str,
    ) -> (ConnectionLifecycle, mpsc::UnboundedReceiver<Arc<str>>) {
        let lifecycle = ConnectionLifecycle::new(registry.clone(), doc_id);
        let (tx, rx) = mpsc::unbounded_channel();
        lifecycle.open(tx);
        (lifecycle, rx)
    }

    fn assert_received_update(rx: &mut mpsc::UnboundedReceiver<Arc<str>>, content: &str) {
        let frame = rx.try_recv().expect("peer should have received a frame");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "content_update", "content": content })
        );
    }

    #[tokio::test]
    async fn test_save_notifies_every_subscriber_and_persists() {
        let (registry, service) = memory_service();
        let (_peer_a, mut rx_a) = connect_peer(&registry, "doc-1");
        let (_peer_b, mut rx_b) = connect_peer(&registry, "doc-1");

        service.save_and_notify("doc-1", "hello").await.unwrap();

        assert_received_update(&mut rx_a, "hello");
        assert_received_update(&mut rx_b, "hello");

        // Read-after-write
        assert_eq!(service.fetch_or_create("doc-1").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_one_peer_leaving_does_not_affect_the_other() {
        let (registry, service) = memory_service();
        let (peer_a, _rx_a) = connect_peer(&registry, "doc-1");
        let (_peer_b, mut rx_b) = connect_peer(&registry, "doc-1");

        peer_a.close();

        service.save_and_notify("doc-1", "still flowing").await.unwrap();
        assert_received_update(&mut rx_b, "still flowing");
    }

    #[tokio::test]
    async fn test_broadcast_after_last_peer_disconnects() {
        let (registry, service) = memory_service();
        let (peer_a, _rx_a) = connect_peer(&registry, "doc-2");

        peer_a.close();
        assert!(registry.snapshot("doc-2").is_empty());

        // No subscribers is not an error
        service.save_and_notify("doc-2", "into the void").await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_or_create_is_idempotent() {
        let (_registry, service) = memory_service();

        assert_eq!(service.fetch_or_create("new-doc").await.unwrap(), "");
        assert_eq!(service.fetch_or_create("new-doc").await.unwrap(), "");

        service.save_and_notify("new-doc", "content").await.unwrap();
        assert_eq!(service.fetch_or_create("new-doc").await.unwrap(), "content");
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_and_suppresses_broadcast() {
        let (registry, service) = service_with(Arc::new(FailingStorage));
        let (_peer, mut rx) = connect_peer(&registry, "doc-1");

        let result = service.save_and_notify("doc-1", "lost").await;

        assert!(matches!(result, Err(RealdocError::Storage(_))));
        assert!(rx.try_recv().is_err(), "no broadcast after a failed write");
        // Membership is untouched by a storage failure
        assert_eq!(registry.subscriber_count("doc-1"), 1);
    }

    #[tokio::test]
    async fn test_saver_receives_its_own_update() {
        // A peer that both edits and subscribes gets its own change echoed
        // back; there is no sender exclusion.
        let (registry, service) = memory_service();
        let (_saver, mut rx) = connect_peer(&registry, "doc-1");

        service.save_and_notify("doc-1", "my own words").await.unwrap();
        assert_received_update(&mut rx, "my own words");
    }
}
