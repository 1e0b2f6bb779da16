//! Document stores for per-user history.
//!
//! Documents are schemaless JSON objects addressed by
//! `users/{uid}/{collection}/{id}`. The store owns `id` and `createdAt`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{StoreError, StoreResult};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Longest accepted user id or collection name.
const MAX_SEGMENT_LEN: usize = 128;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// The document as one JSON object, `id` and `createdAt` included.
    pub fn to_value(&self) -> StoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Storage backend for history documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Append a document. `data` must be a JSON object; any `id` or
    /// `createdAt` keys in it are replaced.
    async fn add_document(&self, uid: &str, collection: &str, data: Value)
        -> StoreResult<Document>;

    /// All documents in a collection, newest first.
    async fn list_documents(&self, uid: &str, collection: &str) -> StoreResult<Vec<Document>>;

    /// Delete one document, failing with [`StoreError::NotFound`] if absent.
    async fn delete_document(&self, uid: &str, collection: &str, id: &str) -> StoreResult<()>;
}

/// Reject user ids and collection names that are not plain path segments.
pub(crate) fn check_segment(kind: &'static str, value: &str) -> StoreResult<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_SEGMENT_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidPath {
            kind,
            value: value.to_string(),
        })
    }
}

pub(crate) fn check_location(uid: &str, collection: &str) -> StoreResult<()> {
    check_segment("user id", uid)?;
    check_segment("collection", collection)
}

/// Build a new document whose timestamp is strictly after `latest`.
pub(crate) fn new_document(data: Value, latest: Option<DateTime<Utc>>) -> StoreResult<Document> {
    let Value::Object(mut fields) = data else {
        return Err(StoreError::InvalidDocument(
            "document must be a JSON object".to_string(),
        ));
    };
    fields.remove("id");
    fields.remove("createdAt");

    Ok(Document {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: next_timestamp(Utc::now(), latest),
        fields,
    })
}

/// `now`, or one microsecond after `latest` if the clock has not moved past it.
pub(crate) fn next_timestamp(now: DateTime<Utc>, latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match latest {
        Some(latest) if now <= latest => latest + Duration::microseconds(1),
        _ => now,
    }
}

/// Sort newest first.
pub(crate) fn newest_first(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    documents
}
