//! File storage seam used by the document upload step.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::UploadError;

/// Upload progress in percent, `0..=100`.
pub type ProgressStream = Pin<Box<dyn Stream<Item = u8> + Send>>;

/// A running upload.
///
/// Progress events are available once through [`UploadTask::take_progress`];
/// [`UploadTask::download_url`] resolves when the transfer finishes.
pub struct UploadTask {
    progress: Option<ProgressStream>,
    done: oneshot::Receiver<Result<String, UploadError>>,
}

impl UploadTask {
    pub fn new(
        progress: ProgressStream,
        done: oneshot::Receiver<Result<String, UploadError>>,
    ) -> Self {
        Self {
            progress: Some(progress),
            done,
        }
    }

    pub fn take_progress(&mut self) -> Option<ProgressStream> {
        self.progress.take()
    }

    pub async fn download_url(self) -> Result<String, UploadError> {
        self.done
            .await
            .unwrap_or_else(|_| Err(UploadError::Transfer("upload task ended early".to_string())))
    }
}

/// Remote file storage.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Start uploading `bytes` to `path`.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<UploadTask, UploadError>;
}

/// Percentages reported for a transfer of `total` bytes sent in `chunks`.
fn progress_steps(total: usize, chunks: usize) -> Vec<u8> {
    if total == 0 || chunks == 0 {
        return vec![100];
    }
    let chunk = total.div_ceil(chunks);
    let mut sent = 0;
    let mut steps = Vec::new();
    while sent < total {
        sent = (sent + chunk).min(total);
        steps.push((sent * 100 / total) as u8);
    }
    steps
}

/// File storage held in memory. URLs are `{base_url}/{path}`.
pub struct MemoryBlobStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    base_url: String,
    failing: AtomicBool,
}

impl Default for MemoryBlobStorage {
    fn default() -> Self {
        Self::new("mem://blobs")
    }
}

impl MemoryBlobStorage {
    const CHUNKS: usize = 4;

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            base_url: base_url.into(),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent transfers fail after reporting progress.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<UploadTask, UploadError> {
        let steps = progress_steps(bytes.len(), Self::CHUNKS);
        let (progress_tx, progress_rx) = mpsc::channel(steps.len());
        let (done_tx, done_rx) = oneshot::channel();

        let blobs = self.blobs.clone();
        let path = path.trim_start_matches('/').to_string();
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let failing = self.failing.load(Ordering::SeqCst);

        tokio::spawn(async move {
            for pct in steps {
                // Nobody listening is fine.
                let _ = progress_tx.send(pct).await;
            }
            drop(progress_tx);

            let result = if failing {
                Err(UploadError::Transfer("storage rejected the upload".to_string()))
            } else {
                blobs.write().await.insert(path, bytes);
                Ok(url)
            };
            let _ = done_tx.send(result);
        });

        Ok(UploadTask::new(
            Box::pin(ReceiverStream::new(progress_rx)),
            done_rx,
        ))
    }
}
