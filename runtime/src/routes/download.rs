use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{Response, StatusCode, header},
    routing::get,
};
use tokio_util::io::ReaderStream;

use super::{ApiError, api_error, types::ErrorResponse};
use crate::{AppState, error::ErrorKind};

pub fn download_routes() -> Router<Arc<AppState>> {
    Router::new().route("/analysis/{id}/source", get(download_source))
}

async fn download_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let (record, reader) = state
        .pipeline
        .open_source(&id)
        .await
        .map_err(|err| api_error(&err))?;

    let file_name = record.file_name().unwrap_or("source.pdf");
    let stream = ReaderStream::new(reader);
    Response::builder()
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment_name(file_name)),
        )
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from_stream(stream))
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(ErrorResponse {
                    kind: ErrorKind::Store,
                    message: format!("Error in sending response {err}"),
                }),
            )
        })
}

/// Header-safe rendition of a stored file name.
fn attachment_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
