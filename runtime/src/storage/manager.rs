use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use super::{BlobStorage, KvStorage, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoragesStatus {
    #[default]
    Created,
    Initialized,
}

enum Backend {
    Records(Arc<dyn KvStorage>),
    Blobs(Arc<dyn BlobStorage>),
}

struct Registered {
    name: &'static str,
    backend: Backend,
}

/// Owns the lifecycle of the collections the service persists to.
///
/// Storages are initialized one after another in registration order.
#[derive(Default)]
pub struct StorageManager {
    status: StoragesStatus,
    storages: Vec<Registered>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StoragesStatus {
        self.status
    }

    pub fn register_kv<T>(&mut self, name: &'static str, storage: Arc<T>)
    where
        T: KvStorage + 'static,
    {
        self.storages.push(Registered {
            name,
            backend: Backend::Records(storage),
        });
    }

    pub fn register_blob<T>(&mut self, name: &'static str, storage: Arc<T>)
    where
        T: BlobStorage + 'static,
    {
        self.storages.push(Registered {
            name,
            backend: Backend::Blobs(storage),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    pub async fn initialize_all(&mut self) -> StorageResult<()> {
        if self.status == StoragesStatus::Initialized {
            return Ok(());
        }

        for Registered { name, backend } in &self.storages {
            let initialized = match backend {
                Backend::Records(storage) => storage.initialize().await,
                Backend::Blobs(storage) => storage.initialize().await,
            };
            initialized.map_err(|err| err.context(format!("failed to initialize storage {name}")))?;
            info!(storage = name, "storage initialized");
        }

        self.status = StoragesStatus::Initialized;
        Ok(())
    }

    /// Flushes every record collection, even when an earlier one fails.
    pub async fn finalize_all(&self) -> StorageResult<()> {
        let mut failed = Vec::new();
        for Registered { name, backend } in &self.storages {
            // blobs are written through, nothing to flush
            let Backend::Records(storage) = backend else {
                continue;
            };
            if let Err(err) = storage.finalize().await {
                warn!(storage = name, error = %err, "storage finalize failed");
                failed.push(*name);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("failed to finalize storages: {}", failed.join(", ")))
        }
    }
}
