//! Object store capability used by the upload pipeline.

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::object_path::{self, PLACEHOLDER_FOLDER};

#[cfg(test)]
pub mod memory;
pub mod s3;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object url: {0}")]
    InvalidUrl(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `key` with public-read visibility and returns its public URL.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError>;

    /// Deletes the object behind a public URL. Placeholder objects are left alone.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;

    /// URL segment that identifies this store's host in public URLs.
    fn host_marker(&self) -> &str;
}

/// Resolves the key to delete for a public URL.
///
/// Returns `Ok(None)` for placeholder objects, which are never deleted.
pub fn deletion_key(url: &str, bucket: &str, host_marker: &str) -> Result<Option<String>, StorageError> {
    if url.is_empty() {
        return Err(StorageError::InvalidUrl("file URL cannot be empty".to_string()));
    }

    if object_path::extract_folder_with_marker(url, host_marker) == PLACEHOLDER_FOLDER {
        return Ok(None);
    }

    object_path::key_from_url(url, bucket)
        .map(Some)
        .ok_or_else(|| StorageError::InvalidUrl(format!("could not find a key in {}", url)))
}
