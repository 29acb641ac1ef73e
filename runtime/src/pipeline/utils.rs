use std::sync::Arc;

use anyhow::{Result, anyhow};
use tiktoken_rs::{CoreBPE, o200k_base};
use uuid::Uuid;

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> Result<String>;
}

pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new() -> Result<Self> {
        let bpe = o200k_base()?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.bpe.decode(tokens.to_vec())
    }
}

/// Caps source text at a token budget before it is sent for generation.
#[derive(Clone)]
pub struct InputLimiter {
    tokenizer: Arc<dyn Tokenizer>,
    max_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedInput {
    pub text: String,
    pub original_tokens: usize,
    pub truncated: bool,
}

impl InputLimiter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, max_tokens: usize) -> Self {
        Self {
            tokenizer,
            max_tokens,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn limit(&self, text: &str) -> Result<LimitedInput> {
        let tokens = self.tokenizer.encode(text);
        if tokens.len() <= self.max_tokens {
            return Ok(LimitedInput {
                text: text.to_string(),
                original_tokens: tokens.len(),
                truncated: false,
            });
        }

        // a cut can land inside a multi-byte character; step back until it decodes
        let mut end = self.max_tokens;
        loop {
            match self.tokenizer.decode(&tokens[..end]) {
                Ok(truncated) => {
                    return Ok(LimitedInput {
                        text: truncated,
                        original_tokens: tokens.len(),
                        truncated: true,
                    });
                }
                Err(_) if end > 0 && self.max_tokens - end < 4 => end -= 1,
                Err(err) => return Err(anyhow!("failed to truncate source text: {err}")),
            }
        }
    }
}

pub fn generate_analysis_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn sanitize_text(input: &str) -> String {
    input.replace('\r', "").replace('\0', "").trim().to_string()
}
