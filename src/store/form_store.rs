//! FormStore — persisted step drafts under one namespaced record.
//!
//! The record is a JSON object mapping step key → payload. Every operation is
//! infallible from the caller's point of view: storage failures are logged
//! and degrade to "no draft".

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::traits::DraftStorage;
use crate::config::DEFAULT_DRAFT_NAMESPACE;

/// Drafts keyed by step, as loaded from the store.
pub type Drafts = BTreeMap<String, Value>;

/// Step draft cache over a [`DraftStorage`] backend.
#[derive(Clone)]
pub struct FormStore {
    storage: Arc<dyn DraftStorage>,
    namespace: String,
}

impl FormStore {
    pub fn new(storage: Arc<dyn DraftStorage>) -> Self {
        Self::with_namespace(storage, DEFAULT_DRAFT_NAMESPACE)
    }

    pub fn with_namespace(storage: Arc<dyn DraftStorage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Write or overwrite the draft for `step_key`.
    pub async fn save(&self, step_key: &str, payload: &Value) {
        let mut record = match self.read_record().await {
            Ok(record) => record,
            Err(e) => {
                warn!(step = step_key, "Error saving form data: {}", e);
                return;
            }
        };
        record.insert(step_key.to_string(), payload.clone());

        let encoded = match serde_json::to_string(&Value::Object(record)) {
            Ok(s) => s,
            Err(e) => {
                warn!(step = step_key, "Failed to encode form data: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&self.namespace, &encoded).await {
            warn!(step = step_key, "Error saving form data: {}", e);
            return;
        }
        debug!(step = step_key, "Draft saved");
    }

    /// The draft for `step_key`, or `None` if absent or unreadable.
    pub async fn load(&self, step_key: &str) -> Option<Value> {
        match self.read_record().await {
            Ok(mut record) => record.remove(step_key).filter(|v| !v.is_null()),
            Err(e) => {
                warn!(step = step_key, "Error loading form data: {}", e);
                None
            }
        }
    }

    /// Every saved draft; empty on error.
    pub async fn load_all(&self) -> Drafts {
        match self.read_record().await {
            Ok(record) => record.into_iter().collect(),
            Err(e) => {
                warn!("Error loading all form data: {}", e);
                Drafts::new()
            }
        }
    }

    /// Remove every draft.
    pub async fn clear(&self) {
        if let Err(e) = self.storage.remove_item(&self.namespace).await {
            warn!("Error clearing form data: {}", e);
        }
    }

    async fn read_record(&self) -> Result<Map<String, Value>, String> {
        let raw = self
            .storage
            .get_item(&self.namespace)
            .await
            .map_err(|e| e.to_string())?;
        let Some(raw) = raw else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string())? {
            Value::Object(map) => Ok(map),
            other => Err(format!("draft record is not an object: {other}")),
        }
    }
}
