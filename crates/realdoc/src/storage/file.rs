use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::{DocumentRecord, DocumentStorage};
use crate::{RealdocError, RealdocResult};

/// File-backed document storage
///
/// One JSON file per document under a storage directory. Writes go through
/// on every save; there is no caching layer, the registry and broadcaster
/// never hold content beyond a single call.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> RealdocResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        info!("Opened document storage at {:?}", root);
        Ok(Self { root })
    }

    /// File path for a document, refusing ids that would escape the root
    fn record_path(&self, doc_id: &str) -> RealdocResult<PathBuf> {
        if doc_id.is_empty() || doc_id == "." || doc_id == ".." || doc_id.contains(['/', '\\']) {
            return Err(RealdocError::Storage(format!(
                "invalid document id: {:?}",
                doc_id
            )));
        }
        Ok(self.root.join(format!("{}.json", doc_id)))
    }

    async fn read_record(&self, doc_id: &str) -> RealdocResult<Option<DocumentRecord>> {
        let path = self.record_path(doc_id)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &DocumentRecord) -> RealdocResult<()> {
        let path = self.record_path(&record.doc_id)?;
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::write(&path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn get(&self, doc_id: &str) -> RealdocResult<Option<String>> {
        Ok(self
            .read_record(doc_id)
            .await?
            .map(|record| record.content))
    }

    async fn upsert(&self, doc_id: &str, content: &str) -> RealdocResult<()> {
        let mut record = self
            .read_record(doc_id)
            .await?
            .unwrap_or_else(|| DocumentRecord::empty(doc_id));

        record.content = content.to_string();
        record.updated_at = Utc::now();

        self.write_record(&record).await?;
        debug!("Persisted document '{}'", doc_id);
        Ok(())
    }

    async fn ensure_created(&self, doc_id: &str) -> RealdocResult<()> {
        if self.read_record(doc_id).await?.is_none() {
            self.write_record(&DocumentRecord::empty(doc_id)).await?;
            info!("Created empty document '{}'", doc_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_upsert_and_get_roundtrip() {
        let (_dir, storage) = open_temp().await;

        storage.upsert("doc-1", "hello").await.unwrap();
        assert_eq!(storage.get("doc-1").await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_get_unknown_document_returns_none() {
        let (_dir, storage) = open_temp().await;
        assert_eq!(storage.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let (_dir, storage) = open_temp().await;

        storage.upsert("doc-1", "v1").await.unwrap();
        let first = storage.read_record("doc-1").await.unwrap().unwrap();

        storage.upsert("doc-1", "v2").await.unwrap();
        let second = storage.read_record("doc-1").await.unwrap().unwrap();

        assert_eq!(second.content, "v2");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_ensure_created_is_idempotent() {
        let (_dir, storage) = open_temp().await;

        storage.ensure_created("doc-1").await.unwrap();
        storage.upsert("doc-1", "edited").await.unwrap();
        storage.ensure_created("doc-1").await.unwrap();

        assert_eq!(
            storage.get("doc-1").await.unwrap().as_deref(),
            Some("edited")
        );
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../escape")]
    #[case("a/b")]
    #[case("a\\b")]
    #[tokio::test]
    async fn test_path_escaping_ids_are_rejected(#[case] doc_id: &str) {
        let (_dir, storage) = open_temp().await;

        assert!(matches!(
            storage.upsert(doc_id, "x").await,
            Err(RealdocError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_survives_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            storage.upsert("doc-1", "persistent").await.unwrap();
        }

        let storage = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(
            storage.get("doc-1").await.unwrap().as_deref(),
            Some("persistent")
        );
    }
}
