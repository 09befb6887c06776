//! In-memory storage backends, used by tests and the demo server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{DocumentDatabase, DraftStorage, StoredDocument, WriteOptions, merge_documents};
use crate::error::StoreError;

/// Draft storage held in a map. Can be switched into a failing mode to
/// exercise the degrade-to-empty paths.
#[derive(Default)]
pub struct MemoryDraftStorage {
    items: RwLock<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryDraftStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with an I/O error (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("storage unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStorage for MemoryDraftStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// A document plus a monotonically increasing write sequence.
#[derive(Debug, Clone)]
struct Entry {
    data: Value,
    seq: u64,
}

/// Document database held in memory, keyed by `(collection, doc_id)`.
#[derive(Default)]
pub struct MemoryDocuments {
    docs: RwLock<HashMap<(String, String), Entry>>,
    seq: AtomicU64,
    failing: AtomicBool,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of documents across all collections.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("document database unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDocuments {
    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        payload: &Value,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        self.check()?;
        let key = (collection.to_string(), doc_id.to_string());
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.write().await;
        let data = match docs.remove(&key) {
            Some(existing) if options.merge => merge_documents(existing.data, payload),
            _ => payload.clone(),
        };
        docs.insert(key, Entry { data, seq });
        Ok(())
    }

    async fn read(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        let docs = self.docs.read().await;
        Ok(docs
            .get(&(collection.to_string(), doc_id.to_string()))
            .map(|entry| entry.data.clone()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.check()?;
        let docs = self.docs.read().await;
        let mut entries: Vec<(&String, &Entry)> = docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), entry)| (id, entry))
            .collect();
        entries.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));
        Ok(entries
            .into_iter()
            .map(|(id, entry)| StoredDocument {
                id: id.clone(),
                data: entry.data.clone(),
            })
            .collect())
    }
}
