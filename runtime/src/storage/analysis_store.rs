use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use tracing::{debug, warn};

use super::{BlobReader, BlobStorage, KvStorage};
use crate::{
    error::AnalysisError,
    pipeline::types::{AnalysisRecord, SourceKind},
};

const BLOB_KEY_PREFIX: &str = "source-";

/// Key of an analysis inside the record collection.
pub fn record_key(id: &str) -> String {
    id.to_string()
}

/// Key of the raw source document belonging to analysis `id`.
pub fn blob_key(id: &str) -> String {
    format!("{BLOB_KEY_PREFIX}{id}")
}

/// Inverse of [`blob_key`].
pub fn analysis_id_for_blob(key: &str) -> Option<&str> {
    key.strip_prefix(BLOB_KEY_PREFIX).filter(|id| !id.is_empty())
}

/// Records and their raw source documents, kept as two collections.
#[derive(Clone)]
pub struct AnalysisStore {
    records: Arc<dyn KvStorage>,
    blobs: Arc<dyn BlobStorage>,
}

impl AnalysisStore {
    pub fn new(records: Arc<dyn KvStorage>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { records, blobs }
    }

    /// Persists `record`, and `source` under the derived blob key when the
    /// record is document-derived. Saving an existing id overwrites it.
    pub async fn save(
        &self,
        record: &AnalysisRecord,
        source: Option<&[u8]>,
    ) -> Result<(), AnalysisError> {
        if source.is_some() && record.source_kind() != SourceKind::Document {
            return Err(AnalysisError::Store(format!(
                "analysis {} is {}-derived and cannot own a source document",
                record.id,
                record.source_kind().as_str()
            )));
        }

        if let Some(bytes) = source {
            self.blobs
                .put(&blob_key(&record.id), bytes)
                .await
                .map_err(|err| AnalysisError::store(&err))?;
        }

        if let Err(err) = self.write_record(record).await {
            self.discard(&record.id, source.is_some()).await;
            return Err(err);
        }

        debug!(analysis_id = %record.id, with_source = source.is_some(), "analysis persisted");
        Ok(())
    }

    async fn write_record(&self, record: &AnalysisRecord) -> Result<(), AnalysisError> {
        let value = serde_json::to_value(record)
            .context("failed to serialize analysis record")
            .map_err(|err| AnalysisError::store(&err))?;
        let mut payload = HashMap::new();
        payload.insert(record_key(&record.id), value);

        self.records
            .upsert(payload)
            .await
            .map_err(|err| AnalysisError::store(&err))?;
        self.records
            .sync_if_dirty()
            .await
            .map_err(|err| AnalysisError::store(&err))
    }

    /// Drops whatever a failed save left behind so the id stays unknown.
    async fn discard(&self, id: &str, with_source: bool) {
        if let Err(err) = self.records.delete(&[record_key(id)]).await {
            warn!(analysis_id = %id, error = %err, "failed to drop unsaved record");
        }
        if with_source {
            if let Err(err) = self.blobs.delete(&blob_key(id)).await {
                warn!(analysis_id = %id, error = %err, "failed to drop unsaved source document");
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<AnalysisRecord, AnalysisError> {
        let value = self
            .records
            .get_by_id(&record_key(id))
            .await
            .map_err(|err| AnalysisError::store(&err))?
            .ok_or_else(|| AnalysisError::NotFound(id.to_string()))?;

        serde_json::from_value(value)
            .with_context(|| format!("stored analysis {id} is malformed"))
            .map_err(|err| AnalysisError::store(&err))
    }

    /// Streams the original document of a document-derived analysis.
    pub async fn open_source(&self, id: &str) -> Result<(AnalysisRecord, BlobReader), AnalysisError> {
        let record = self.get(id).await?;
        if record.source_kind() != SourceKind::Document {
            return Err(AnalysisError::NotFound(format!("{id} (source document)")));
        }

        let reader = self
            .blobs
            .open(&blob_key(id))
            .await
            .map_err(|err| AnalysisError::store(&err))?
            .ok_or_else(|| AnalysisError::NotFound(format!("{id} (source document)")))?;
        Ok((record, reader))
    }

    /// Removes a record together with its source document.
    pub async fn delete(&self, id: &str) -> Result<(), AnalysisError> {
        let record = self.get(id).await?;

        if record.source_kind() == SourceKind::Document {
            self.blobs
                .delete(&blob_key(id))
                .await
                .map_err(|err| AnalysisError::store(&err))?;
        }

        self.records
            .delete(&[record_key(id)])
            .await
            .map_err(|err| AnalysisError::store(&err))?;
        self.records.sync_if_dirty().await.map_err(|err| {
            warn!(analysis_id = %id, error = %err, "failed to flush deletion");
            AnalysisError::store(&err)
        })?;
        Ok(())
    }
}
