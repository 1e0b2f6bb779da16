//! File-based document store.
//!
//! Layout: `{data_dir}/users/{uid}/{collection}.json`, each file a
//! pretty-printed JSON array in creation order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{check_location, new_document, newest_first, Document, DocumentStore};
use crate::errors::{StoreError, StoreResult};

/// Document store persisted as JSON files.
pub struct FileStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn collection_file(&self, uid: &str, collection: &str) -> PathBuf {
        self.data_dir
            .join("users")
            .join(uid)
            .join(format!("{collection}.json"))
    }

    async fn read_collection(&self, path: &Path) -> StoreResult<Vec<Document>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn write_collection(&self, path: &Path, documents: &[Document]) -> StoreResult<()> {
        let write_error = |e: std::io::Error| StoreError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let content = serde_json::to_string_pretty(documents)?;
        fs::write(path, content).await.map_err(write_error)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn add_document(
        &self,
        uid: &str,
        collection: &str,
        data: Value,
    ) -> StoreResult<Document> {
        check_location(uid, collection)?;
        let path = self.collection_file(uid, collection);

        let _guard = self.lock.lock().await;
        let mut documents = self.read_collection(&path).await?;
        let latest = documents.iter().map(|d| d.created_at).max();
        let document = new_document(data, latest)?;
        documents.push(document.clone());
        self.write_collection(&path, &documents).await?;

        debug!(path = %path.display(), id = %document.id, "Document added");
        Ok(document)
    }

    async fn list_documents(&self, uid: &str, collection: &str) -> StoreResult<Vec<Document>> {
        check_location(uid, collection)?;
        let path = self.collection_file(uid, collection);

        let _guard = self.lock.lock().await;
        let documents = self.read_collection(&path).await?;
        Ok(newest_first(documents))
    }

    async fn delete_document(&self, uid: &str, collection: &str, id: &str) -> StoreResult<()> {
        check_location(uid, collection)?;
        let path = self.collection_file(uid, collection);

        let _guard = self.lock.lock().await;
        let mut documents = self.read_collection(&path).await?;
        let before = documents.len();
        documents.retain(|d| d.id != id);
        if documents.len() == before {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.write_collection(&path, &documents).await?;

        debug!(path = %path.display(), id, "Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_documents_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let doc = {
            let store = FileStore::new(dir.path());
            store
                .add_document("u1", "cropRecommendations", json!({"crop": "maize"}))
                .await
                .unwrap()
        };

        let path = dir.path().join("users/u1/cropRecommendations.json");
        assert!(path.exists());

        let store = FileStore::new(dir.path());
        let listed = store.list_documents("u1", "cropRecommendations").await.unwrap();
        assert_eq!(listed, vec![doc]);
    }

    #[tokio::test]
    async fn test_newest_first_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let a = store
            .add_document("u1", "diseaseDetections", json!({"n": 1}))
            .await
            .unwrap();
        let b = store
            .add_document("u1", "diseaseDetections", json!({"n": 2}))
            .await
            .unwrap();
        assert!(b.created_at > a.created_at);

        let ids: Vec<_> = store
            .list_documents("u1", "diseaseDetections")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![b.id.clone(), a.id.clone()]);

        store
            .delete_document("u1", "diseaseDetections", &a.id)
            .await
            .unwrap();
        assert!(matches!(
            store.delete_document("u1", "diseaseDetections", &a.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(
            store
                .list_documents("u1", "diseaseDetections")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store
            .list_documents("nobody", "cropRecommendations")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.add_document("..", "cropRecommendations", json!({})).await,
            Err(StoreError::InvalidPath { .. })
        ));
    }
}
