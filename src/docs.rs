use utoipa::OpenApi;
use crate::modules::upload::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::upload::handler::enqueue_upload,
        crate::modules::upload::handler::health,
    ),
    components(
        schemas(UploadMultipart, EnqueueUploadResponse, HealthResponse)
    ),
    tags(
        (name = "Upload", description = "Deferred object storage uploads")
    )
)]
pub struct ApiDoc;
