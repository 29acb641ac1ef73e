use std::{sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use super::{
    analyzer::ContentAnalyzer,
    extractor::DocumentExtractor,
    transcript::{TranscriptFetcher, VideoReference, flatten_transcript},
    types::{AnalysisRecord, AnalysisSource, SourceKind},
    utils::generate_analysis_id,
};
use crate::{
    error::AnalysisError,
    storage::{AnalysisStore, BlobReader},
};

/// Extract → analyze → persist, for documents and for videos.
///
/// The steps are not transactional: a failure while persisting leaves nothing
/// behind but the generation cost already spent.
pub struct AnalysisPipeline {
    document_extractor: Arc<dyn DocumentExtractor>,
    transcripts: Arc<dyn TranscriptFetcher>,
    analyzer: ContentAnalyzer,
    store: AnalysisStore,
}

impl AnalysisPipeline {
    pub fn new(
        document_extractor: Arc<dyn DocumentExtractor>,
        transcripts: Arc<dyn TranscriptFetcher>,
        analyzer: ContentAnalyzer,
        store: AnalysisStore,
    ) -> Self {
        Self {
            document_extractor,
            transcripts,
            analyzer,
            store,
        }
    }

    pub fn store(&self) -> &AnalysisStore {
        &self.store
    }

    pub async fn analyze_document(
        &self,
        payload: &[u8],
        file_name: &str,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let started = Instant::now();
        info!(file_name, bytes = payload.len(), "document analysis started");

        let text = self
            .document_extractor
            .extract(payload)
            .await
            .inspect_err(|err| warn!(file_name, error = %err, "document extraction failed"))?;

        let source = AnalysisSource::Document {
            file_name: file_name.to_string(),
        };
        let record = self.analyze_and_build(&text, source).await?;

        self.persist(&record, Some(payload)).await?;
        info!(
            analysis_id = %record.id,
            file_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document analysis stored"
        );
        Ok(record)
    }

    pub async fn analyze_video(&self, url: &str) -> Result<AnalysisRecord, AnalysisError> {
        let started = Instant::now();
        let reference = VideoReference::parse(url)
            .inspect_err(|err| warn!(url, error = %err, "rejected video reference"))?;
        info!(video_id = %reference.video_id, "video analysis started");

        let segments = self
            .transcripts
            .fetch(&reference.video_id)
            .await
            .map_err(|err| err.into_analysis_error(&reference.video_id))
            .inspect_err(|err| {
                warn!(video_id = %reference.video_id, error = %err, "transcript retrieval failed")
            })?;
        let text = flatten_transcript(&segments);

        let source = AnalysisSource::Video {
            source_url: reference.url.clone(),
        };
        let record = self.analyze_and_build(&text, source).await?;

        self.persist(&record, None).await?;
        info!(
            analysis_id = %record.id,
            video_id = %reference.video_id,
            segments = segments.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "video analysis stored"
        );
        Ok(record)
    }

    pub async fn get_analysis(&self, id: &str) -> Result<AnalysisRecord, AnalysisError> {
        self.store.get(id).await
    }

    pub async fn open_source(
        &self,
        id: &str,
    ) -> Result<(AnalysisRecord, BlobReader), AnalysisError> {
        self.store.open_source(id).await
    }

    async fn analyze_and_build(
        &self,
        text: &str,
        source: AnalysisSource,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let kind: SourceKind = source.kind();
        let artifacts = self.analyzer.analyze(text, kind).await?;
        Ok(AnalysisRecord::new(
            generate_analysis_id(),
            source,
            artifacts,
            Utc::now(),
        ))
    }

    async fn persist(
        &self,
        record: &AnalysisRecord,
        source: Option<&[u8]>,
    ) -> Result<(), AnalysisError> {
        self.store.save(record, source).await.inspect_err(|err| {
            error!(analysis_id = %record.id, error = %err, "failed to persist analysis")
        })
    }
}
