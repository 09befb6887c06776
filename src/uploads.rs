//! Document upload step — required document slots and their uploads.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, watch};
use tracing::{info, warn};

use crate::blobs::BlobStorage;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::UploadError;
use crate::identity::IdentityProvider;
use crate::wizard::payload::{DocumentRecord, DocumentsPayload};

const MIB: u64 = 1024 * 1024;

/// Asks the platform for storage access before a file is picked.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_storage(&self) -> bool;
}

/// Grants every request. Platforms without a storage permission use this.
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_storage(&self) -> bool {
        true
    }
}

/// A file chosen by the user.
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: Some(name.into()),
            content_type: Some(content_type.into()),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub download_url: String,
}

/// One required document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSlot {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_uploaded: bool,
    pub file: Option<UploadedFile>,
}

impl DocumentSlot {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_uploaded: false,
            file: None,
        }
    }
}

/// The slots every agency fills in.
pub fn default_slots() -> Vec<DocumentSlot> {
    vec![
        DocumentSlot::new(
            "gov_id",
            "Government ID",
            "Upload driver's license, NID, or Passport",
        ),
        DocumentSlot::new(
            "trade_license",
            "Trade License",
            "Upload trade license or equivalent document",
        ),
    ]
}

/// Latest progress report of the upload in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub slot: String,
    pub percent: u8,
}

pub struct DocumentUploader {
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStorage>,
    permissions: Arc<dyn PermissionGate>,
    max_bytes: u64,
    slots: RwLock<Vec<DocumentSlot>>,
    progress: watch::Sender<UploadProgress>,
}

impl DocumentUploader {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStorage>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        let (progress, _) = watch::channel(UploadProgress::default());
        Self {
            identity,
            blobs,
            permissions,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            slots: RwLock::new(default_slots()),
            progress,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn with_slots(mut self, slots: Vec<DocumentSlot>) -> Self {
        self.slots = RwLock::new(slots);
        self
    }

    pub async fn slots(&self) -> Vec<DocumentSlot> {
        self.slots.read().await.clone()
    }

    pub async fn all_uploaded(&self) -> bool {
        self.slots.read().await.iter().all(|s| s.is_uploaded)
    }

    /// Progress updates for the upload in flight. Resets to 0 when it ends.
    pub fn watch_progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    /// Upload `file` into `slot_id` and mark the slot uploaded.
    ///
    /// Storage permission is requested first; a denial aborts this upload
    /// and nothing else.
    pub async fn upload(&self, slot_id: &str, file: PickedFile) -> Result<String, UploadError> {
        if !self.slots.read().await.iter().any(|s| s.id == slot_id) {
            return Err(UploadError::UnknownSlot(slot_id.to_string()));
        }
        if !self.permissions.request_storage().await {
            warn!(slot = slot_id, "Storage permission denied");
            return Err(UploadError::PermissionDenied);
        }
        if file.size() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: file.size(),
                limit_mb: self.max_bytes / MIB,
            });
        }
        let user = self
            .identity
            .current_user()
            .await
            .ok_or(UploadError::NotAuthenticated)?;

        let name = file.name.clone().unwrap_or_else(|| "document".to_string());
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let size = file.size();
        let path = format!("users/{}/documents/{}/{}", user.uid, slot_id, name);

        let result = self.transfer(slot_id, &path, file.bytes).await;
        self.progress.send_replace(UploadProgress {
            slot: slot_id.to_string(),
            percent: 0,
        });
        let download_url = result?;

        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.iter_mut().find(|s| s.id == slot_id) {
            slot.is_uploaded = true;
            slot.file = Some(UploadedFile {
                name,
                content_type,
                size,
                download_url: download_url.clone(),
            });
        }
        info!(slot = slot_id, %path, "Document uploaded");
        Ok(download_url)
    }

    async fn transfer(&self, slot_id: &str, path: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        let mut task = self.blobs.upload(path, bytes).await?;
        if let Some(mut progress) = task.take_progress() {
            while let Some(percent) = progress.next().await {
                self.progress.send_replace(UploadProgress {
                    slot: slot_id.to_string(),
                    percent,
                });
            }
        }
        task.download_url().await
    }

    /// Restore upload state from a saved step draft.
    pub async fn restore(&self, saved: &DocumentsPayload) {
        let mut slots = self.slots.write().await;
        for record in &saved.documents {
            let Some(slot) = slots.iter_mut().find(|s| s.id == record.id) else {
                continue;
            };
            if let (true, Some(url)) = (record.is_uploaded, &record.download_url) {
                slot.is_uploaded = true;
                slot.file = Some(UploadedFile {
                    name: slot.name.clone(),
                    content_type: "application/octet-stream".to_string(),
                    size: 0,
                    download_url: url.clone(),
                });
            }
        }
    }

    /// The step draft: `{documents: [{id, isUploaded, downloadUrl}]}`.
    pub async fn payload(&self) -> Value {
        let documents = self
            .slots
            .read()
            .await
            .iter()
            .map(|slot| DocumentRecord {
                id: slot.id.clone(),
                is_uploaded: slot.is_uploaded,
                download_url: slot.file.as_ref().map(|f| f.download_url.clone()),
            })
            .collect();
        serde_json::to_value(DocumentsPayload {
            documents,
            ..Default::default()
        })
        .unwrap_or(Value::Null)
    }
}
