use std::sync::Arc;

pub mod ai;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod storage;

use config::AppConfig;
use pipeline::AnalysisPipeline;

pub use error::{AnalysisError, ErrorKind};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<AnalysisPipeline>,
}
