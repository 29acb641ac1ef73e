use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    extract::{Multipart, Path as UrlPath, State},
    routing::{get, post},
};
use tracing::{error, info};

use super::{ApiError, api_error, bad_request, types::AnalyzeVideoRequest};
use crate::{AppState, pipeline::AnalysisRecord};

pub fn analysis_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze-document", post(analyze_document))
        .route("/analyze-pdf", post(analyze_document))
        .route("/analyze-video", post(analyze_video))
        .route("/analyze-youtube", post(analyze_video))
        .route("/analysis/{id}", get(get_analysis))
}

async fn analyze_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisRecord>, ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(format!("invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            original_filename = field.file_name().map(|name| name.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|err| bad_request(format!("failed to read upload field: {err}")))?;
            file_bytes = Some(data.to_vec());
            break;
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| bad_request("missing file field in multipart payload"))?;
    let original_filename =
        original_filename.ok_or_else(|| bad_request("uploaded file missing filename"))?;
    let file_name = display_file_name(&original_filename)
        .ok_or_else(|| bad_request(format!("invalid filename '{original_filename}'")))?;

    let record = state
        .pipeline
        .analyze_document(&file_bytes, &file_name)
        .await
        .map_err(|err| {
            error!(file_name = %file_name, kind = ?err.kind(), error = %err, "document analysis failed");
            api_error(&err)
        })?;

    info!(analysis_id = %record.id, file_name = %file_name, "document analyzed");
    Ok(Json(record))
}

async fn analyze_video(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeVideoRequest>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    let record = state
        .pipeline
        .analyze_video(&request.url)
        .await
        .map_err(|err| {
            error!(url = %request.url, kind = ?err.kind(), error = %err, "video analysis failed");
            api_error(&err)
        })?;

    info!(analysis_id = %record.id, "video analyzed");
    Ok(Json(record))
}

async fn get_analysis(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    state
        .pipeline
        .get_analysis(&id)
        .await
        .map(Json)
        .map_err(|err| api_error(&err))
}

/// Last path component of an uploaded file name, which browsers may send
/// with a client-side directory attached.
fn display_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Path::new(last)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
