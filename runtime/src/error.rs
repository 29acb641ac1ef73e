use serde::Serialize;
use thiserror::Error;
use tracing::error;
use ts_rs::TS;

/// Failures surfaced by the analysis pipeline to its callers.
///
/// Every variant carries a human-readable message; none of them carry backend
/// payloads or backtraces.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid video reference: {0}")]
    InvalidReference(String),

    #[error("no transcript available for video {video_id}: {reason}")]
    TranscriptUnavailable { video_id: String, reason: String },

    #[error("transcript service unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to extract document text: {0}")]
    Extraction(String),

    #[error("analysis backend failed: {0}")]
    AnalysisBackend(String),

    #[error("storage failure: {0}")]
    Store(String),

    #[error("analysis {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ErrorKind {
    InvalidRequest,
    InvalidReference,
    TranscriptUnavailable,
    SourceUnavailable,
    Extraction,
    AnalysisBackend,
    Store,
    NotFound,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidReference(_) => ErrorKind::InvalidReference,
            AnalysisError::TranscriptUnavailable { .. } => ErrorKind::TranscriptUnavailable,
            AnalysisError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            AnalysisError::Extraction(_) => ErrorKind::Extraction,
            AnalysisError::AnalysisBackend(_) => ErrorKind::AnalysisBackend,
            AnalysisError::Store(_) => ErrorKind::Store,
            AnalysisError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Whether re-running the same request can succeed. Structural input
    /// errors never become valid on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::SourceUnavailable(_) | AnalysisError::AnalysisBackend(_)
        )
    }

    pub(crate) fn backend(err: &anyhow::Error) -> Self {
        AnalysisError::AnalysisBackend(format!("{err:#}"))
    }

    /// The cause chain names files on disk, so it is logged and kept out of
    /// the caller-facing message.
    pub(crate) fn store(err: &anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "analysis storage operation failed");
        AnalysisError::Store("analysis storage is unavailable".to_string())
    }
}
