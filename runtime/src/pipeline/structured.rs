//! Decoding of the backend's structured answers.
//!
//! Generation output is free text that is *expected* to contain a JSON array.
//! [`decode_json_array`] is the single fallible step; each artifact then
//! applies its own fallback when that step fails:
//!
//! * key points fall back to the raw answer as a one-element list,
//! * the quiz falls back to an empty list.
//!
//! Quiz items are validated individually and never reach a record unless the
//! correct answer is one of the options.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::types::QuizItem;

/// Field names under which a model tends to wrap the array it was asked for.
const WRAPPER_FIELDS: &[&str] = &["keyPoints", "key_points", "points", "quiz", "questions", "items"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("answer is empty")]
    Empty,
    #[error("answer does not contain a json array")]
    NotAnArray,
    #[error("answer list holds no text")]
    NoText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Parsed,
    /// The structured step failed and the artifact's fallback was used.
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub value: T,
    pub outcome: DecodeOutcome,
    /// Elements that were present but rejected.
    pub dropped: usize,
}

impl<T> Decoded<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, DecodeOutcome::Fallback(_))
    }
}

/// Finds the JSON array in a model answer.
///
/// Accepts a bare array, an array inside a Markdown code fence, an array
/// embedded in prose, and an object wrapping one array field.
pub fn decode_json_array(raw: &str) -> Result<Vec<Value>, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Some(items) = parse_array_like(unfenced) {
        return Ok(items);
    }

    unfenced
        .match_indices('[')
        .map(|(start, _)| start)
        .filter(|&start| opens_embedded_array(unfenced, start))
        .find_map(|start| leading_array(&unfenced[start..]))
        .ok_or(DecodeError::NotAnArray)
}

/// An array inside prose counts only when it starts its own line or follows a
/// colon ("Here are the points: [...]"). Bracketed citations such as `[1]`
/// mid-sentence do not.
fn opens_embedded_array(text: &str, start: usize) -> bool {
    let line = text[..start].rsplit('\n').next().unwrap_or_default().trim_end();
    line.trim_start().is_empty() || line.ends_with(':')
}

/// The array value at the start of `text`, ignoring whatever trails it.
fn leading_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
    {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string (```json)
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_array_like(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            let arrays: Vec<&Vec<Value>> = WRAPPER_FIELDS
                .iter()
                .filter_map(|field| map.get(*field).and_then(Value::as_array))
                .collect();
            match arrays.as_slice() {
                [only] => Some((*only).clone()),
                _ if map.len() == 1 => map.values().next()?.as_array().cloned(),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Key points: a list of non-empty strings, or the raw answer as the only
/// point when no list can be found.
pub fn decode_key_points(raw: &str) -> Decoded<Vec<String>> {
    let items = decode_json_array(raw).and_then(|items| {
        let has_text = items.iter().any(|item| item.is_string() || item.is_object());
        if items.is_empty() || has_text {
            Ok(items)
        } else {
            Err(DecodeError::NoText)
        }
    });
    match items {
        Ok(items) => {
            let total = items.len();
            let points: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    Value::Object(map) => ["point", "text", "keyPoint"]
                        .iter()
                        .find_map(|field| map.get(*field).and_then(Value::as_str))
                        .map(|text| text.trim().to_string()),
                    _ => None,
                })
                .filter(|text| !text.is_empty())
                .collect();
            Decoded {
                dropped: total - points.len(),
                value: points,
                outcome: DecodeOutcome::Parsed,
            }
        }
        Err(err) => {
            let raw = raw.trim();
            Decoded {
                value: if raw.is_empty() {
                    Vec::new()
                } else {
                    vec![raw.to_string()]
                },
                outcome: DecodeOutcome::Fallback(err.to_string()),
                dropped: 0,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuizItemPayload {
    question: String,
    options: Vec<Value>,
    #[serde(alias = "correct_answer", alias = "answer")]
    #[serde(rename = "correctAnswer")]
    correct_answer: Value,
}

/// Quiz: every item that survives validation, or nothing when no list can be
/// found.
pub fn decode_quiz(raw: &str) -> Decoded<Vec<QuizItem>> {
    match decode_json_array(raw) {
        Ok(items) => {
            let total = items.len();
            let quiz: Vec<QuizItem> = items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<QuizItemPayload>(item).ok())
                .filter_map(validate_quiz_item)
                .collect();
            Decoded {
                dropped: total - quiz.len(),
                value: quiz,
                outcome: DecodeOutcome::Parsed,
            }
        }
        Err(err) => Decoded {
            value: Vec::new(),
            outcome: DecodeOutcome::Fallback(err.to_string()),
            dropped: 0,
        },
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn validate_quiz_item(payload: QuizItemPayload) -> Option<QuizItem> {
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return None;
    }

    let options: Vec<String> = payload
        .options
        .iter()
        .filter_map(scalar_text)
        .filter(|option| !option.is_empty())
        .collect();
    let mut seen = HashSet::new();
    if options.len() < 2 || !options.iter().all(|option| seen.insert(option.as_str())) {
        return None;
    }

    let answer = scalar_text(&payload.correct_answer)?;
    let correct_answer = if options.contains(&answer) {
        answer
    } else {
        // a casing slip is corrected only when it is unambiguous
        let mut matches = options
            .iter()
            .filter(|option| option.to_lowercase() == answer.to_lowercase());
        match (matches.next(), matches.next()) {
            (Some(only), None) => only.clone(),
            _ => return None,
        }
    };

    let item = QuizItem {
        question,
        options,
        correct_answer,
    };
    item.is_valid().then_some(item)
}
