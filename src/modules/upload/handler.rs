use super::dto::{EnqueueUploadResponse, HealthResponse, UploadForm, UploadMultipart};
use super::service::{UploadRequest, UploadSource};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use validator::Validate;

/// Stage a file and enqueue it for upload
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    request_body(content = UploadMultipart, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Upload job enqueued", body = ApiResponse<EnqueueUploadResponse>),
        (status = 400, description = "Bad Request"),
        (status = 413, description = "Payload Too Large"),
        (status = 503, description = "Queue unavailable")
    ),
    tag = "Upload"
)]
pub async fn enqueue_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let (form, source) = match read_form(&mut multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = form.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    if let Some(source) = &source {
        info!(file_name = %source.file_name, size = source.bytes.len(), path = %form.path, "Received upload");
    }

    let request = UploadRequest {
        source,
        destination_hint: form.path,
        compress_to_webp: form.compress,
        replace_of: form.old_file,
    };

    match state.producer.enqueue_upload(request).await {
        Ok(enqueued) => ApiSuccess(
            ApiResponse::success(EnqueueUploadResponse::from(enqueued), "Upload job enqueued"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Liveness of the API and its queue connection
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthResponse>),
        (status = 503, description = "Queue unavailable")
    ),
    tag = "Upload"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.producer.ping().await {
        Ok(()) => ApiSuccess(
            ApiResponse::success(HealthResponse { redis: "ok".to_string() }, "Service healthy"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<(UploadForm, Option<UploadSource>), ApiError> {
    let mut form = UploadForm::default();
    let mut source = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                source = Some(UploadSource { file_name, bytes });
            }
            "path" => form.path = field.text().await.map_err(multipart_error)?.trim().to_string(),
            "compress" => form.compress = parse_flag(&field.text().await.map_err(multipart_error)?),
            "old_file" => {
                let value = field.text().await.map_err(multipart_error)?.trim().to_string();
                form.old_file = (!value.is_empty()).then_some(value);
            }
            _ => {}
        }
    }

    Ok((form, source))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError(e.body_text(), e.status())
}
