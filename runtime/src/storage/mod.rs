use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

pub mod analysis_store;
pub mod fs_blob;
pub mod io;
pub mod json_kv;
pub mod manager;

pub use analysis_store::{AnalysisStore, analysis_id_for_blob, blob_key, record_key};
pub use fs_blob::{FsBlobStorage, FsBlobStorageConfig};
pub use io::*;
pub use json_kv::{JsonKvStorage, JsonKvStorageConfig};
pub use manager::{StorageManager, StoragesStatus};

pub type StorageResult<T> = Result<T>;

/// Boxed reader handed out for streaming a stored blob.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait KvStorage: Send + Sync {
    async fn initialize(&self) -> StorageResult<()>;
    async fn finalize(&self) -> StorageResult<()>;

    async fn upsert(&self, records: HashMap<String, serde_json::Value>) -> StorageResult<()>;

    async fn delete(&self, ids: &[String]) -> StorageResult<()>;
    async fn drop_all(&self) -> StorageResult<()>;

    async fn get_all(&self) -> StorageResult<HashMap<String, serde_json::Value>>;
    async fn get_by_id(&self, id: &str) -> StorageResult<Option<serde_json::Value>>;

    /// Flush dirty state to disk if needed.
    async fn sync_if_dirty(&self) -> StorageResult<()>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn initialize(&self) -> StorageResult<()>;

    /// Writes the blob under `key`, replacing any previous content.
    async fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    async fn open(&self, key: &str) -> StorageResult<Option<BlobReader>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
