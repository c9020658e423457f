use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::error::JobError;
use crate::infrastructure::queue::Job;

/// Queue field carrying the JSON-encoded intent.
pub const PAYLOAD_FIELD: &str = "payload";

/// Upload intent as it travels through the queue.
///
/// Field names are part of the wire contract shared with other producers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadIntentWire {
    #[serde(rename = "FilePath", default)]
    pub file_path: String,
    #[serde(rename = "IsCompressToWebp", default)]
    pub is_compress_to_webp: Option<bool>,
    #[serde(rename = "FilePathTmp", default)]
    pub file_path_tmp: Option<String>,
    #[serde(rename = "OldFile", default)]
    pub old_file: Option<String>,
}

/// A validated upload job.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadIntent {
    /// Path hint used to derive the storage folder and object name.
    pub destination_path: String,
    /// Binary staged by the producer.
    pub staged_file_ref: PathBuf,
    pub compress_to_webp: bool,
    /// Previously stored object superseded by this upload.
    pub replace_of: Option<String>,
}

impl UploadIntent {
    pub fn to_wire(&self) -> UploadIntentWire {
        UploadIntentWire {
            file_path: self.destination_path.clone(),
            is_compress_to_webp: Some(self.compress_to_webp),
            file_path_tmp: Some(self.staged_file_ref.to_string_lossy().into_owned()),
            old_file: self.replace_of.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_wire())
    }
}

impl TryFrom<UploadIntentWire> for UploadIntent {
    type Error = DecodeFailure;

    fn try_from(wire: UploadIntentWire) -> Result<Self, Self::Error> {
        if wire.file_path.trim().is_empty() {
            return Err(DecodeFailure::MissingDestination);
        }
        let staged = wire.file_path_tmp.ok_or(DecodeFailure::MissingStagedFile)?;
        let compress = wire.is_compress_to_webp.ok_or(DecodeFailure::MissingCompressFlag)?;

        Ok(Self {
            destination_path: wire.file_path,
            staged_file_ref: PathBuf::from(staged),
            compress_to_webp: compress,
            replace_of: wire.old_file.filter(|old| !old.is_empty()),
        })
    }
}

/// Why a delivered job can never be processed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("payload field missing")]
    MissingPayload,

    #[error("payload is not a string")]
    PayloadNotString,

    #[error("failed to unmarshal payload: {0}")]
    MalformedPayload(String),

    #[error("FilePath field missing or empty")]
    MissingDestination,

    #[error("FilePathTmp field missing")]
    MissingStagedFile,

    #[error("IsCompressToWebp field missing")]
    MissingCompressFlag,

    #[error("tmp file not found ({})", .0.display())]
    StagedFileAbsent(PathBuf),
}

impl From<DecodeFailure> for JobError {
    fn from(failure: DecodeFailure) -> Self {
        match failure {
            DecodeFailure::StagedFileAbsent(_) => JobError::NotFound(failure.to_string()),
            other => JobError::InvalidInput(other.to_string()),
        }
    }
}

/// Decodes the payload of a delivered job without touching the filesystem.
pub fn decode_payload(job: &Job) -> Result<UploadIntent, DecodeFailure> {
    let raw = job.field(PAYLOAD_FIELD).ok_or(DecodeFailure::MissingPayload)?;
    let json = std::str::from_utf8(raw).map_err(|_| DecodeFailure::PayloadNotString)?;
    let wire: UploadIntentWire =
        serde_json::from_str(json).map_err(|e| DecodeFailure::MalformedPayload(e.to_string()))?;
    UploadIntent::try_from(wire)
}

/// Decodes a delivered job and checks that its staged file is still on disk.
pub async fn decode_job(job: &Job) -> Result<UploadIntent, DecodeFailure> {
    let intent = decode_payload(job)?;
    match tokio::fs::try_exists(&intent.staged_file_ref).await {
        Ok(true) => Ok(intent),
        _ => Err(DecodeFailure::StagedFileAbsent(intent.staged_file_ref)),
    }
}
