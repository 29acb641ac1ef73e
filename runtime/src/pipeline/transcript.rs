use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;
use tracing::debug;

use crate::error::AnalysisError;

static VIDEO_URL_PATTERNS: LazyLock<Result<Vec<Regex>, regex::Error>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?(?:[^#\s]*?&)?v=([A-Za-z0-9_-]+)",
        r"youtu\.be/([A-Za-z0-9_-]+)",
        r"youtube\.com/embed/([A-Za-z0-9_-]+)",
    ]
    .into_iter()
    .map(Regex::new)
    .collect()
});

/// A video identified by one of the accepted URL shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub url: String,
    pub video_id: String,
}

impl VideoReference {
    pub fn parse(url: &str) -> Result<Self, AnalysisError> {
        let url = url.trim();
        let patterns = VIDEO_URL_PATTERNS.as_ref().map_err(|err| {
            AnalysisError::InvalidReference(format!("video URL patterns unavailable: {err}"))
        })?;
        patterns
            .iter()
            .find_map(|pattern| pattern.captures(url))
            .and_then(|captures| captures.get(1))
            .map(|id| Self {
                url: url.to_string(),
                video_id: id.as_str().to_string(),
            })
            .ok_or_else(|| AnalysisError::InvalidReference(format!("unrecognized video URL '{url}'")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    /// Seconds from the start of the video.
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    /// No usable transcript: missing, disabled, or the video does not exist.
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Transport(String),
}

impl TranscriptError {
    pub fn into_analysis_error(self, video_id: &str) -> AnalysisError {
        match self {
            TranscriptError::Unavailable(reason) => AnalysisError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason,
            },
            TranscriptError::Transport(message) => AnalysisError::SourceUnavailable(message),
        }
    }
}

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

/// Captions in chronological order, one per line, timing dropped.
pub fn flatten_transcript(segments: &[TranscriptSegment]) -> String {
    let mut ordered: Vec<&TranscriptSegment> = segments.iter().collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));
    ordered
        .into_iter()
        .map(|segment| segment.text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    /// `asr` marks auto-generated captions.
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        self.language_code == language
            || self
                .language_code
                .strip_prefix(language)
                .is_some_and(|rest| rest.starts_with('-'))
    }
}

#[derive(Debug, Deserialize)]
struct Json3Transcript {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Reads caption tracks published on a YouTube watch page.
pub struct YoutubeTranscriptFetcher {
    http: Client,
    base: String,
    languages: Vec<String>,
}

impl YoutubeTranscriptFetcher {
    pub fn new(base: String, languages: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            languages,
        })
    }

    async fn get_text(&self, url: &str, missing: &str) -> Result<String, TranscriptError> {
        let resp = self
            .http
            .get(url)
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.8")
            .send()
            .await
            .map_err(|err| TranscriptError::Transport(format!("request failed | {err}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TranscriptError::Unavailable(missing.to_string()));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptError::Transport(format!(
                "transcript service returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(TranscriptError::Unavailable(format!(
                "transcript service returned {status}"
            )));
        }

        resp.text()
            .await
            .map_err(|err| TranscriptError::Transport(format!("failed to read body | {err}")))
    }

    fn caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
        let Some(marker) = html.find("\"captionTracks\":") else {
            if html.contains("\"playabilityStatus\":{\"status\":\"ERROR\"") {
                return Err(TranscriptError::Unavailable("video is unavailable".into()));
            }
            return Err(TranscriptError::Unavailable(
                "transcripts are disabled for this video".into(),
            ));
        };

        let list = json_array_at(&html[marker..]).ok_or_else(|| {
            TranscriptError::Unavailable("caption track list is malformed".into())
        })?;
        serde_json::from_str(list)
            .map_err(|_| TranscriptError::Unavailable("caption track list is malformed".into()))
    }

    fn select_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        for language in &self.languages {
            let preferred = tracks
                .iter()
                .filter(|track| track.matches_language(language))
                .min_by_key(|track| track.is_generated());
            if preferred.is_some() {
                return preferred;
            }
        }
        tracks.iter().min_by_key(|track| track.is_generated())
    }

    fn track_url(&self, track: &CaptionTrack) -> String {
        let url = if track.base_url.starts_with('/') {
            format!("{}{}", self.base, track.base_url)
        } else {
            track.base_url.clone()
        };
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}fmt=json3")
    }

    fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let transcript: Json3Transcript = serde_json::from_str(body)
            .map_err(|_| TranscriptError::Unavailable("caption track is malformed".into()))?;
        Ok(transcript
            .events
            .into_iter()
            .filter_map(|event| {
                let text: String = event.segs?.into_iter().map(|seg| seg.utf8).collect();
                Some(TranscriptSegment {
                    text,
                    start: event.start_ms as f64 / 1000.0,
                    duration: event.duration_ms as f64 / 1000.0,
                })
            })
            .collect())
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptFetcher {
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let watch_url = format!("{}/watch?v={video_id}", self.base);
        let html = self.get_text(&watch_url, "video not found").await?;

        let tracks = Self::caption_tracks(&html)?;
        let track = self
            .select_track(&tracks)
            .ok_or_else(|| TranscriptError::Unavailable("video has no caption tracks".into()))?;
        debug!(
            video_id,
            language = %track.language_code,
            generated = track.is_generated(),
            "caption track selected"
        );

        let body = self
            .get_text(&self.track_url(track), "caption track not found")
            .await?;
        let segments = Self::parse_json3(&body)?;
        if segments.is_empty() {
            return Err(TranscriptError::Unavailable("caption track is empty".into()));
        }
        Ok(segments)
    }
}

/// The JSON array starting at the first `[` of `text`, matched by depth.
fn json_array_at(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
