use std::{sync::Arc, time::Instant};

use anyhow::Context;
use futures::try_join;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use super::{
    structured::{DecodeOutcome, decode_key_points, decode_quiz},
    types::{AnalysisArtifacts, SourceKind},
    utils::{InputLimiter, TiktokenTokenizer},
};
use crate::{
    ai::{
        ResponsesClient,
        generator::{GenerationRequest, TextGenerator},
        prompts::{self, Prompt},
    },
    config::AiConfig,
    error::AnalysisError,
};

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Produces summary, key points and quiz for a piece of source text.
#[derive(Clone)]
pub struct ContentAnalyzer {
    generator: Arc<dyn TextGenerator>,
    limiter: Option<InputLimiter>,
    config: AnalyzerConfig,
}

impl ContentAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: AnalyzerConfig) -> Self {
        Self {
            generator,
            limiter: None,
            config,
        }
    }

    /// Analyzer backed by the Responses API. The per-artifact deadline is
    /// never shorter than the time the client may spend retrying.
    pub fn from_config(ai: &AiConfig, api_key: String) -> anyhow::Result<Self> {
        let client =
            ResponsesClient::new(api_key, Some(ai.base_url.clone()), ai.attempt_timeout())?
                .with_max_attempts(ai.max_attempts);
        let retry_budget = client.retry_budget();
        let request_timeout = ai.request_timeout().max(retry_budget);
        if request_timeout > ai.request_timeout() {
            warn!(
                configured_secs = ai.request_timeout_secs,
                retry_budget_ms = retry_budget.as_millis() as u64,
                "request timeout shorter than the retry budget, extending it"
            );
        }

        let analyzer = Self::new(
            Arc::new(client),
            AnalyzerConfig {
                model: ai.model.clone(),
                request_timeout,
            },
        );
        let Some(max_tokens) = ai.max_input_tokens else {
            return Ok(analyzer);
        };
        let tokenizer = TiktokenTokenizer::new().context("failed to load tokenizer")?;
        Ok(analyzer.with_input_limit(InputLimiter::new(Arc::new(tokenizer), max_tokens)))
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    pub fn with_input_limit(mut self, limiter: InputLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Issues the three generation requests concurrently. Any backend failure
    /// or an empty summary fails the whole analysis; malformed key points or
    /// quiz answers degrade to their fallbacks.
    pub async fn analyze(
        &self,
        text: &str,
        source_kind: SourceKind,
    ) -> Result<AnalysisArtifacts, AnalysisError> {
        let started = Instant::now();
        let limited;
        let text = match &self.limiter {
            Some(limiter) => {
                limited = limiter.limit(text).map_err(|err| AnalysisError::backend(&err))?;
                if limited.truncated {
                    warn!(
                        source_kind = source_kind.as_str(),
                        tokens = limited.original_tokens,
                        max_tokens = limiter.max_tokens(),
                        "source text exceeds input budget, truncating"
                    );
                }
                limited.text.as_str()
            }
            None => text,
        };

        let (summary, key_points_raw, quiz_raw) = try_join!(
            self.request("summary", &prompts::SUMMARY, text),
            self.request("key_points", &prompts::KEY_POINTS, text),
            self.request("quiz", &prompts::QUIZ, text),
        )?;

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(AnalysisError::AnalysisBackend(
                "backend returned an empty summary".to_string(),
            ));
        }

        let key_points = decode_key_points(&key_points_raw);
        if let DecodeOutcome::Fallback(reason) = &key_points.outcome {
            warn!(%reason, "key points were not a list, keeping raw answer");
        }

        let quiz = decode_quiz(&quiz_raw);
        if let DecodeOutcome::Fallback(reason) = &quiz.outcome {
            warn!(%reason, "quiz was not a list, leaving it empty");
        }
        if quiz.dropped > 0 {
            warn!(dropped = quiz.dropped, kept = quiz.value.len(), "dropped invalid quiz items");
        }

        info!(
            source_kind = source_kind.as_str(),
            key_points = key_points.value.len(),
            quiz_items = quiz.value.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "content analyzed"
        );

        Ok(AnalysisArtifacts {
            summary,
            key_points: key_points.value,
            quiz: quiz.value,
        })
    }

    async fn request(
        &self,
        artifact: &'static str,
        prompt: &Prompt,
        text: &str,
    ) -> Result<String, AnalysisError> {
        let input = prompt.input_for(text);
        let request = GenerationRequest {
            model: &self.config.model,
            instructions: prompt.system,
            input: &input,
        };

        let answer = timeout(self.config.request_timeout, self.generator.generate(&request))
            .await
            .map_err(|_| {
                AnalysisError::AnalysisBackend(format!(
                    "{artifact} request timed out after {}s",
                    self.config.request_timeout.as_secs_f32()
                ))
            })?
            .map_err(|err| {
                warn!(artifact, error = %err, "generation request failed");
                AnalysisError::backend(&err)
            })?;

        debug!(artifact, chars = answer.len(), "generation answer received");
        Ok(answer)
    }
}
