//! On-disk staging of upload payloads shared by producer and worker.

use std::io;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::debug;

use crate::common::object_path;

pub fn unix_nanos() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos()
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` to `{dir}/{job_id}_{unix_nanos}{ext}`, creating the
    /// directory on demand.
    pub async fn stage(&self, job_id: &str, original_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!(
            "{}_{}{}",
            job_id,
            unix_nanos(),
            object_path::extension(original_name)
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), size = bytes.len(), "Staged upload payload");
        Ok(path)
    }

    /// Deletes a staged file once its job no longer needs it.
    pub async fn remove(path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await?;
        debug!(path = %path.display(), "Removed staged upload payload");
        Ok(())
    }
}
