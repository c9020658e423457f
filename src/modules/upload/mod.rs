use axum::Router;
use axum::routing::post;
use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod staging;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads", post(handler::enqueue_upload))
}
