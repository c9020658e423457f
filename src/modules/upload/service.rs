use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::UploadIntent;
use super::staging::{unix_nanos, StagingArea};
use crate::common::error::JobError;
use crate::common::object_path;
use crate::infrastructure::queue::JobQueue;
use crate::infrastructure::storage::ObjectStore;

/// Inbound file handle.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: Option<UploadSource>,
    /// Destination hint: a relative path such as `users/avatar.png` or the
    /// public URL of an object in the target folder.
    pub destination_hint: String,
    pub compress_to_webp: bool,
    pub replace_of: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnqueuedUpload {
    pub job_id: String,
    pub stream_id: String,
    /// Public URL the object will have once the worker has uploaded it.
    pub object_url: String,
    pub staged_file: PathBuf,
}

#[derive(Clone)]
pub struct UploadProducer {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
    staging: StagingArea,
    stream: String,
}

impl UploadProducer {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
        staging: StagingArea,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            store,
            staging,
            stream: stream.into(),
        }
    }

    pub async fn ping(&self) -> Result<(), JobError> {
        self.queue
            .ping()
            .await
            .map_err(|e| JobError::Transient(e.to_string()))
    }

    /// Stages the file, fixes its destination and enqueues an upload job.
    pub async fn enqueue_upload(&self, req: UploadRequest) -> Result<EnqueuedUpload, JobError> {
        let source = req
            .source
            .ok_or_else(|| JobError::InvalidInput("file cannot be empty".to_string()))?;
        if source.bytes.is_empty() {
            return Err(JobError::InvalidInput("file cannot be empty".to_string()));
        }
        if req.destination_hint.trim().is_empty() {
            return Err(JobError::InvalidInput("path cannot be empty".to_string()));
        }

        let job_id = Uuid::new_v4().to_string();

        let staged_file = self
            .staging
            .stage(&job_id, &source.file_name, &source.bytes)
            .await
            .map_err(|e| JobError::Transient(format!("failed to write tmp file: {}", e)))?;

        let folder =
            object_path::extract_folder_with_marker(&req.destination_hint, self.store.host_marker());
        let mut ext = object_path::extension(&source.file_name);
        if ext.is_empty() {
            ext = object_path::extension(&object_path::base_name(&req.destination_hint));
        }
        let file_name = format!("{}{}", unix_nanos(), ext);
        let destination_path = object_path::object_key(&folder, &file_name);

        let stored_name = if req.compress_to_webp {
            object_path::replace_extension(&file_name, ".webp")
        } else {
            file_name
        };
        let object_url = self
            .store
            .public_url(&object_path::object_key(&folder, &stored_name));

        let intent = UploadIntent {
            destination_path,
            staged_file_ref: staged_file.clone(),
            compress_to_webp: req.compress_to_webp,
            replace_of: req.replace_of.filter(|old| !old.is_empty()),
        };

        let payload = match intent.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                self.discard(&staged_file).await;
                return Err(JobError::InvalidInput(format!("failed to marshal job payload: {}", e)));
            }
        };

        let stream_id = match self.queue.enqueue(&self.stream, &job_id, &payload).await {
            Ok(id) => id,
            Err(e) => {
                self.discard(&staged_file).await;
                return Err(JobError::Transient(format!("failed to enqueue job: {}", e)));
            }
        };

        info!(%job_id, %stream_id, %object_url, "Enqueued upload job");

        Ok(EnqueuedUpload {
            job_id,
            stream_id,
            object_url,
            staged_file,
        })
    }

    async fn discard(&self, staged_file: &std::path::Path) {
        if let Err(e) = StagingArea::remove(staged_file).await {
            warn!(path = %staged_file.display(), "Failed to remove orphaned tmp file: {}", e);
        }
    }
}
