use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

use super::utils::sanitize_text;
use crate::error::AnalysisError;

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Plain text of every page, in page order.
    async fn extract(&self, payload: &[u8]) -> Result<String, AnalysisError>;
}

/// Text extraction for PDF documents.
#[derive(Debug, Default, Clone)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_pages(payload: &[u8]) -> Result<Vec<String>, AnalysisError> {
        if payload.is_empty() {
            return Err(AnalysisError::Extraction("document is empty".to_string()));
        }

        let document = Document::load_mem(payload).map_err(|err| {
            AnalysisError::Extraction(format!("payload is not a readable PDF document: {err}"))
        })?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(AnalysisError::Extraction(
                "document contains no pages".to_string(),
            ));
        }

        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => texts.push(sanitize_text(&text)),
                Err(err) => {
                    warn!(page = page_number, error = %err, "page text could not be decoded");
                    texts.push(String::new());
                }
            }
        }
        Ok(texts)
    }
}

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, payload: &[u8]) -> Result<String, AnalysisError> {
        let owned = payload.to_vec();
        let pages = tokio::task::spawn_blocking(move || Self::extract_pages(&owned))
            .await
            .map_err(|err| AnalysisError::Extraction(format!("extraction task failed: {err}")))??;

        let text = pages
            .iter()
            .filter(|page| !page.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        debug!(pages = pages.len(), chars = text.chars().count(), "document text extracted");
        Ok(text)
    }
}
