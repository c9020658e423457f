//! Upload pipeline: staged file → optional re-encode → object store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::info;

use super::media::{self, MediaError, SNIFF_LEN, WEBP_CONTENT_TYPE};
use super::model::UploadIntent;
use crate::common::error::JobError;
use crate::common::object_path;
use crate::infrastructure::storage::{ObjectStore, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub folder: String,
    /// Name hint; only its last segment is used.
    pub name: String,
    pub compress_to_webp: bool,
}

impl UploadOptions {
    pub fn for_intent(intent: &UploadIntent, host_marker: &str) -> Self {
        Self {
            folder: object_path::extract_folder_with_marker(&intent.destination_path, host_marker),
            name: intent.destination_path.clone(),
            compress_to_webp: intent.compress_to_webp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read staged file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("image task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<&PipelineError> for JobError {
    fn from(err: &PipelineError) -> Self {
        JobError::Transient(err.to_string())
    }
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads a local file and returns the public URL of the stored object.
    async fn upload(&self, local_path: &Path, options: &UploadOptions) -> Result<String, PipelineError>;

    /// Deletes a previously stored object by public URL.
    async fn delete(&self, url: &str) -> Result<(), PipelineError>;
}

#[derive(Clone)]
pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Uploader for UploadPipeline {
    async fn upload(&self, local_path: &Path, options: &UploadOptions) -> Result<String, PipelineError> {
        let mut file = tokio::fs::File::open(local_path).await?;
        let size = file.metadata().await?.len();

        let mut head = vec![0u8; SNIFF_LEN];
        let n = file.read(&mut head).await?;
        let mut content_type = media::sniff_content_type(&head[..n], &options.name);
        file.rewind().await?;

        let mut data = Vec::with_capacity(size as usize);
        file.read_to_end(&mut data).await?;

        let mut file_name = object_path::base_name(&options.name);

        if options.compress_to_webp {
            data = tokio::task::spawn_blocking(move || media::encode_webp(&data))
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))??;
            content_type = WEBP_CONTENT_TYPE.to_string();
            file_name = object_path::replace_extension(&file_name, ".webp");

            info!(size_before = size, size_after = data.len(), "Compressed upload to webp");
        } else {
            let ct = content_type.clone();
            data = tokio::task::spawn_blocking(move || media::normalize(data, &ct))
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
        }

        let key = object_path::object_key(&options.folder, &file_name);
        let url = self.store.put(&key, Bytes::from(data), &content_type).await?;

        info!(%url, "Successfully uploaded file");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), PipelineError> {
        self.store.delete(url).await?;
        Ok(())
    }
}
