use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{AppState, error::AnalysisError};

pub mod analysis;
pub mod download;

pub mod types;

pub use analysis::analysis_routes;
pub use download::download_routes;
use types::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(analysis_routes())
        .merge(download_routes())
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .with_state(state)
}

pub(crate) fn api_error(err: &AnalysisError) -> ApiError {
    let status = match err {
        AnalysisError::InvalidReference(_) => StatusCode::BAD_REQUEST,
        AnalysisError::Extraction(_) | AnalysisError::TranscriptUnavailable { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AnalysisError::SourceUnavailable(_) | AnalysisError::AnalysisBackend(_) => {
            StatusCode::BAD_GATEWAY
        }
        AnalysisError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, Json(ErrorResponse::from(err)))
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            kind: crate::error::ErrorKind::InvalidRequest,
            message: message.into(),
        }),
    )
}

/// Liveness only; the listener is bound after storages are initialized.
async fn health() -> &'static str {
    "ok"
}
