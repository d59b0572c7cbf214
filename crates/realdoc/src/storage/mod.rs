use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[cfg(feature = "persistence")]
pub mod file;

#[cfg(feature = "persistence")]
pub use file::FileStorage;

/// A stored document
///
/// Document IDs are opaque, externally supplied strings; the server never
/// generates them. Content is arbitrary-length text, replaced wholesale on
/// every save (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create an empty record for a document that was read before any save
    pub fn empty(doc_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            doc_id: doc_id.into(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable document storage consumed by the save coordinator
///
/// This is the entire surface the collaboration core needs from a storage
/// engine; everything behind it is the implementation's business.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Current content for `doc_id`, or `None` if the document is unknown
    async fn get(&self, doc_id: &str) -> crate::RealdocResult<Option<String>>;

    /// Create the document with `content`, or replace its content if it exists
    ///
    /// Bumps `updated_at`; `created_at` is preserved across updates.
    async fn upsert(&self, doc_id: &str, content: &str) -> crate::RealdocResult<()>;

    /// Create an empty document if absent; a no-op if it already exists
    async fn ensure_created(&self, doc_id: &str) -> crate::RealdocResult<()>;
}

/// In-memory document storage
///
/// Backs tests and zero-setup deployments; contents do not survive a restart.
pub struct MemoryStorage {
    documents: DashMap<String, DocumentRecord>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Number of documents currently stored
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn get(&self, doc_id: &str) -> crate::RealdocResult<Option<String>> {
        Ok(self
            .documents
            .get(doc_id)
            .map(|record| record.content.clone()))
    }

    async fn upsert(&self, doc_id: &str, content: &str) -> crate::RealdocResult<()> {
        self.documents
            .entry(doc_id.to_string())
            .and_modify(|record| {
                record.content = content.to_string();
                record.updated_at = Utc::now();
            })
            .or_insert_with(|| {
                let mut record = DocumentRecord::empty(doc_id);
                record.content = content.to_string();
                record
            });
        Ok(())
    }

    async fn ensure_created(&self, doc_id: &str) -> crate::RealdocResult<()> {
        self.documents
            .entry(doc_id.to_string())
            .or_insert_with(|| DocumentRecord::empty(doc_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_unknown_document_returns_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let storage = MemoryStorage::new();

        storage.upsert("doc-1", "first").await.unwrap();
        assert_eq!(storage.get("doc-1").await.unwrap().as_deref(), Some("first"));

        storage.upsert("doc-1", "second").await.unwrap();
        assert_eq!(
            storage.get("doc-1").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(storage.document_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_created_is_idempotent() {
        let storage = MemoryStorage::new();

        storage.ensure_created("doc-1").await.unwrap();
        assert_eq!(storage.get("doc-1").await.unwrap().as_deref(), Some(""));

        // A second call must not clobber existing content
        storage.upsert("doc-1", "edited").await.unwrap();
        storage.ensure_created("doc-1").await.unwrap();
        assert_eq!(
            storage.get("doc-1").await.unwrap().as_deref(),
            Some("edited")
        );
    }
}
