use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::fs;

use super::io::write_bytes_file;
use super::{BlobReader, BlobStorage};

#[derive(Clone, Debug)]
pub struct FsBlobStorageConfig {
    pub working_dir: PathBuf,
    pub namespace: String,
    pub workspace: Option<String>,
}

/// One file per key under `{working_dir}/{workspace}/{namespace}/`.
#[derive(Clone, Debug)]
pub struct FsBlobStorage {
    dir: PathBuf,
}

impl FsBlobStorage {
    pub fn new(config: FsBlobStorageConfig) -> Self {
        let FsBlobStorageConfig {
            working_dir,
            namespace,
            workspace,
        } = config;

        let base = match workspace.as_deref() {
            Some(ws) if !ws.is_empty() => working_dir.join(ws),
            _ => working_dir,
        };

        Self {
            dir: base.join(namespace),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("blob key cannot be empty"));
        }

        if trimmed != key || key.contains("..") || key.contains('/') || key.contains('\\') {
            return Err(anyhow!("invalid blob key '{key}'"));
        }

        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl BlobStorage for FsBlobStorage {
    async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create blob directory {}", self.dir.display()))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        write_bytes_file(&path, bytes)
            .await
            .with_context(|| format!("failed to write blob {}", path.display()))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read blob {}", path.display())),
        }
    }

    async fn open(&self, key: &str) -> Result<Option<BlobReader>> {
        let path = self.path_for(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to open blob {}", path.display())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to stat blob {}", path.display()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to delete blob {}", path.display()))
            }
        }
    }
}
