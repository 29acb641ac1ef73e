use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use super::generator::{GenerationRequest, TextGenerator};

const MAX_ERROR_DETAIL: usize = 300;
const INITIAL_BACKOFF: Duration = Duration::from_millis(300);
const MAX_JITTER_MS: u64 = 250;

/// Client for the OpenAI Responses API.
pub struct ResponsesClient {
    http: Client,
    api_key: String,
    base: String,
    attempt_timeout: Duration,
    max_attempts: u32,
}

impl ResponsesClient {
    /// `attempt_timeout` bounds each HTTP attempt, not the retry loop.
    pub fn new(api_key: String, base: Option<String>, attempt_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(attempt_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            api_key,
            base: base
                .unwrap_or_else(|| "https://api.openai.com".into())
                .trim_end_matches('/')
                .to_string(),
            attempt_timeout,
            max_attempts: 4,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Longest a single `responses_text` call can take: every attempt running
    /// into its timeout plus the largest possible backoff between them.
    pub fn retry_budget(&self) -> Duration {
        let mut total = self.attempt_timeout * self.max_attempts;
        let mut delay = INITIAL_BACKOFF;
        for _ in 1..self.max_attempts {
            total += delay;
            delay = next_delay(delay, MAX_JITTER_MS);
        }
        total
    }

    /// Concatenated assistant text of a Responses API payload.
    pub fn extract_output_text(root: &Value) -> Option<String> {
        if let Some(text) = root.get("output_text").and_then(Value::as_str) {
            return Some(text.to_string());
        }

        let items = root.get("output")?.as_array()?;
        let mut pieces = Vec::new();
        for item in items {
            let Some(blocks) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for block in blocks {
                let is_text = block
                    .get("type")
                    .and_then(Value::as_str)
                    .is_none_or(|kind| kind == "output_text");
                if let (true, Some(text)) = (is_text, block.get("text").and_then(Value::as_str)) {
                    pieces.push(text);
                }
            }
        }

        if pieces.is_empty() {
            None
        } else {
            Some(pieces.concat())
        }
    }

    fn error_detail(body: &str) -> String {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());
        detail.chars().take(MAX_ERROR_DETAIL).collect()
    }

    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/v1{}", self.base, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
    }

    pub async fn responses_text(&self, model: &str, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": model,
            "input": [
                { "role": "system", "content": [{ "type": "input_text", "text": system }] },
                { "role": "user",   "content": [{ "type": "input_text", "text": user }] }
            ],
            "store": false,
        });

        let mut delay = INITIAL_BACKOFF;
        for attempt in 1..=self.max_attempts {
            let last_attempt = attempt == self.max_attempts;
            match self.post_json("/responses", &body).await {
                Ok(resp) if resp.status().is_success() => {
                    let v: Value = resp
                        .json()
                        .await
                        .with_context(|| "Error decoding OpenAI responses payload")?;
                    if let Some(status) = v.get("status").and_then(Value::as_str) {
                        if status == "failed" || status == "cancelled" {
                            anyhow::bail!("OpenAI response {status}");
                        }
                    }
                    debug!(model, attempt, "responses call completed");
                    return Self::extract_output_text(&v)
                        .ok_or_else(|| anyhow!("OpenAI response contained no output text"));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let transient =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if transient && !last_attempt {
                        warn!(%status, attempt, "transient OpenAI error, retrying");
                    } else {
                        let err_txt = resp.text().await.unwrap_or_default();
                        anyhow::bail!("OpenAI error {}: {}", status, Self::error_detail(&err_txt));
                    }
                }
                Err(err) if (err.is_timeout() || err.is_connect()) && !last_attempt => {
                    warn!(error = %err, attempt, "OpenAI request failed, retrying");
                }
                Err(err) => anyhow::bail!("Network error | {err}"),
            }

            sleep(delay).await;
            delay = next_delay(delay, fastrand::u64(0..MAX_JITTER_MS));
        }
        anyhow::bail!("Retries exhausted")
    }
}

fn next_delay(delay: Duration, jitter_ms: u64) -> Duration {
    Duration::from_millis((delay.as_millis() as f64 * 1.8) as u64 + jitter_ms)
}

#[async_trait]
impl TextGenerator for ResponsesClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.responses_text(request.model, request.instructions, request.input)
            .await
    }
}
