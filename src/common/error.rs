use axum::http::StatusCode;

/// Outcome classes for anything that touches an upload job.
///
/// Only `Transient` failures are retried; `InvalidInput` and `NotFound` jobs
/// are skipped for good, and `Fatal` aborts the process at startup.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Transient(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            JobError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            JobError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
