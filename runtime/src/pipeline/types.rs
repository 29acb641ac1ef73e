use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SourceKind {
    Document,
    Video,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::Video => "video",
        }
    }
}

/// Where an analysis came from. Serialized flat into the record as
/// `sourceKind` plus exactly one of `fileName` / `sourceUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "sourceKind", rename_all = "lowercase")]
#[ts(export)]
pub enum AnalysisSource {
    Document {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Video {
        #[serde(rename = "sourceUrl")]
        source_url: String,
    },
}

impl AnalysisSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            AnalysisSource::Document { .. } => SourceKind::Document,
            AnalysisSource::Video { .. } => SourceKind::Video,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl QuizItem {
    /// Non-empty question, at least two distinct non-empty options, and an
    /// answer that is one of them.
    pub fn is_valid(&self) -> bool {
        if self.question.trim().is_empty() || self.options.len() < 2 {
            return false;
        }
        let mut seen = HashSet::new();
        let distinct = self
            .options
            .iter()
            .all(|option| !option.trim().is_empty() && seen.insert(option.as_str()));
        distinct && self.options.contains(&self.correct_answer)
    }
}

/// The three generated artifacts, before they are bound to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisArtifacts {
    pub summary: String,
    pub key_points: Vec<String>,
    pub quiz: Vec<QuizItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AnalysisRecord {
    pub id: String,
    #[serde(flatten)]
    pub source: AnalysisSource,
    pub summary: String,
    pub key_points: Vec<String>,
    pub quiz: Vec<QuizItem>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(
        id: String,
        source: AnalysisSource,
        artifacts: AnalysisArtifacts,
        created_at: DateTime<Utc>,
    ) -> Self {
        let AnalysisArtifacts {
            summary,
            key_points,
            quiz,
        } = artifacts;
        Self {
            id,
            source,
            summary,
            key_points,
            quiz,
            created_at,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.source {
            AnalysisSource::Document { file_name } => Some(file_name),
            AnalysisSource::Video { .. } => None,
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        match &self.source {
            AnalysisSource::Video { source_url } => Some(source_url),
            AnalysisSource::Document { .. } => None,
        }
    }
}
