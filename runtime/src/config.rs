use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub working_dir: String,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub transcripts: TranscriptConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub base_url: String,
    /// Bound on one HTTP attempt against the backend.
    pub attempt_timeout_secs: u64,
    /// Deadline for one artifact across all attempts. Raised to the client's
    /// retry budget when configured lower.
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    /// Source text beyond this many tokens is cut before generation.
    pub max_input_tokens: Option<usize>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            attempt_timeout_secs: 60,
            request_timeout_secs: 300,
            max_attempts: 4,
            max_input_tokens: Some(100_000),
        }
    }
}

impl AiConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub base_url: String,
    pub languages: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            languages: vec!["en".to_string()],
            request_timeout_secs: 30,
        }
    }
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl AppConfig {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("invalid configuration document")
    }

    pub fn working_dir(&self) -> PathBuf {
        PathBuf::from(&self.working_dir)
    }
}

pub async fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let contents = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config = AppConfig::from_yaml(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    info!(path = %path.display(), "Configuration loaded from disk");
    Ok(config)
}

pub fn config_path() -> PathBuf {
    env::var("APP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
