//! In-process document store.
//!
//! Each document lives inside a `watch` channel, so the channel value is both
//! the stored state and the feed for every subscriber of that document.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use super::{Document, DocumentStore, Result, Snapshot, StoreError, Subscription};

/// `(collection, id)` address of a document.
type DocKey = (String, String);

/// In-memory [`DocumentStore`] with last-write-wins semantics.
#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<DocKey, watch::Sender<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    fn key(collection: &str, id: &str) -> DocKey {
        (collection.to_string(), id.to_string())
    }

    fn snapshot(&self, collection: &str, id: &str) -> Snapshot {
        self.docs
            .get(&Self::key(collection, id))
            .and_then(|tx| tx.borrow().clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Snapshot> {
        Ok(self.snapshot(collection, id))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<()> {
        let entry = self
            .docs
            .entry(Self::key(collection, id))
            .or_insert_with(|| watch::Sender::new(None));
        entry.send_replace(Some(doc));
        debug!(collection, id, "document set");
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let entry = self.docs.get(&Self::key(collection, id)).ok_or_else(not_found)?;

        let mut found = false;
        entry.send_if_modified(|current| {
            let Some(doc) = current.as_mut() else {
                return false;
            };
            found = true;
            for (field, value) in fields {
                if value.is_null() {
                    doc.remove(&field);
                } else {
                    doc.insert(field, value);
                }
            }
            true
        });

        if !found {
            return Err(not_found());
        }
        debug!(collection, id, "document updated");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(entry) = self.docs.get(&Self::key(collection, id)) {
            entry.send_if_modified(|current| current.take().is_some());
        }
        debug!(collection, id, "document deleted");
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let mut docs: Vec<(String, Document)> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter_map(|entry| {
                let doc = entry.value().borrow().clone()?;
                Some((entry.key().1.clone(), doc))
            })
            .collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription> {
        let entry = self
            .docs
            .entry(Self::key(collection, id))
            .or_insert_with(|| watch::Sender::new(None));
        Ok(Subscription::new(entry.subscribe()))
    }
}
