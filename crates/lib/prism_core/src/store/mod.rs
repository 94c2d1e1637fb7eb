//! Document store abstraction.
//!
//! Documents are JSON objects addressed by `(collection, id)`. The store offers
//! request/response operations plus a push-based [`Subscription`] that always
//! yields the latest full snapshot of a document, never a delta.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;

pub use memory::MemoryStore;

/// A stored document body.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Current state of a document as seen by a reader: `None` when absent.
pub type Snapshot = Option<Document>;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Backend-agnostic document store.
///
/// `update` merges top-level fields into an existing document; a field whose
/// new value is `null` is removed. `delete` succeeds when the document is
/// already absent.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Snapshot>;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<()>;

    /// Merge fields into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()>;

    /// Delete a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// List every document in a collection as `(id, document)` pairs.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Subscribe to live snapshots of one document.
    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription>;
}

/// Live view of a single document.
///
/// The first call to [`Subscription::next`] yields the snapshot current at
/// subscribe time; each later call waits for a change and yields the newest
/// snapshot. Rapid successive writes may be coalesced into one notification.
pub struct Subscription {
    rx: watch::Receiver<Snapshot>,
    primed: bool,
}

impl Subscription {
    /// Wrap a watch receiver fed by a store backend.
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self { rx, primed: false }
    }

    /// Wait for the next snapshot. Returns `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

/// Build a [`Document`] from `(field, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Document
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Serialize a value into a [`Document`].
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// Deserialize a [`Document`] into a typed record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}
