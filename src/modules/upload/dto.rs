use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use super::service::EnqueuedUpload;

/// Text fields of the upload form, collected from the multipart body.
#[derive(Debug, Default, Validate)]
pub struct UploadForm {
    #[validate(length(min = 1, message = "path cannot be empty"))]
    pub path: String,
    pub compress: bool,
    #[validate(url(message = "old_file must be a URL"))]
    pub old_file: Option<String>,
}

/// Multipart body accepted by `POST /api/v1/uploads`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadMultipart {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Destination path or URL of an object in the target folder.
    #[schema(example = "users/avatar.png")]
    pub path: String,
    /// Re-encode to WebP before upload.
    pub compress: Option<bool>,
    /// URL of the object this upload replaces.
    pub old_file: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueUploadResponse {
    pub job_id: String,
    pub stream_id: String,
    /// Public URL the object will have once processed.
    pub object_url: String,
}

impl From<EnqueuedUpload> for EnqueueUploadResponse {
    fn from(e: EnqueuedUpload) -> Self {
        Self {
            job_id: e.job_id,
            stream_id: e.stream_id,
            object_url: e.object_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub redis: String,
}
