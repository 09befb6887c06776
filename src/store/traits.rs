//! Storage traits — the async seams between the wizard and its backends.
//!
//! `DraftStorage` is the device-local key-value store that holds step drafts.
//! `DocumentDatabase` is the remote document database the submission and the
//! dashboard read and write.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Raw key-value storage for draft records.
///
/// Values are opaque strings (JSON in practice); a missing key reads as `None`.
#[async_trait]
pub trait DraftStorage: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// Options for [`DocumentDatabase::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Merge top-level fields into an existing document instead of replacing it.
    pub merge: bool,
}

impl WriteOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// A stored document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

/// Backend-agnostic document database (collections of JSON documents).
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Write `payload` to `collection/doc_id`.
    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        payload: &Value,
        options: WriteOptions,
    ) -> Result<(), StoreError>;

    /// Read `collection/doc_id`.
    async fn read(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, StoreError>;

    /// List every document in `collection`, most recently written first.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;
}

/// Shallow-merge `incoming` into `existing` (top-level keys of objects only).
///
/// Non-object values replace the existing document outright.
pub fn merge_documents(existing: Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (_, other) => other.clone(),
    }
}
