use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{AnalysisError, ErrorKind};

#[derive(Debug, Clone, Deserialize, Serialize, TS)]
#[ts(export)]
pub struct AnalyzeVideoRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalysisError> for ErrorResponse {
    fn from(err: &AnalysisError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
