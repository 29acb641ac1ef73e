use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    /// Role instruction sent as the system message.
    pub instructions: &'a str,
    /// Task prompt followed by the source text.
    pub input: &'a str,
}

/// A text-generation backend. Errors mean the backend could not produce an
/// answer at all (unreachable, rejected, error status).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}
