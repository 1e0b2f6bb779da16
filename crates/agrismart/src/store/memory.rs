//! In-memory document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{check_location, new_document, newest_first, Document, DocumentStore};
use crate::errors::{StoreError, StoreResult};

/// Document store that keeps everything in process memory.
///
/// Each collection is kept in insertion order, which is also `createdAt`
/// order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<(String, String), Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn add_document(
        &self,
        uid: &str,
        collection: &str,
        data: Value,
    ) -> StoreResult<Document> {
        check_location(uid, collection)?;

        let mut collections = self.collections.write().await;
        let documents = collections
            .entry((uid.to_string(), collection.to_string()))
            .or_default();
        let document = new_document(data, documents.last().map(|d| d.created_at))?;
        documents.push(document.clone());
        Ok(document)
    }

    async fn list_documents(&self, uid: &str, collection: &str) -> StoreResult<Vec<Document>> {
        check_location(uid, collection)?;

        let collections = self.collections.read().await;
        let documents = collections
            .get(&(uid.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(newest_first(documents))
    }

    async fn delete_document(&self, uid: &str, collection: &str, id: &str) -> StoreResult<()> {
        check_location(uid, collection)?;

        let mut collections = self.collections.write().await;
        let documents = collections.get_mut(&(uid.to_string(), collection.to_string()));
        let position = documents
            .as_ref()
            .and_then(|docs| docs.iter().position(|d| d.id == id));

        match (documents, position) {
            (Some(docs), Some(index)) => {
                docs.remove(index);
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
