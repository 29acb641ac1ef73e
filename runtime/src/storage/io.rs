use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use super::StorageResult;

pub async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create directory {}", dir.display()))
}

/// `None` when the file is missing or empty.
pub async fn read_json_file<T>(path: &Path) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
{
    let bytes = match fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => return Ok(None),
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .with_context(|| format!("{} is not valid json", path.display()))
}

pub async fn write_json_file<T>(path: &Path, value: &T) -> StorageResult<()>
where
    T: Serialize,
{
    let json = serde_json::to_vec_pretty(value)?;
    write_bytes_file(path, &json).await
}

/// Writes through a uniquely named sibling temp file, fsyncs it, then renames
/// it over `path`. Readers see either the old or the new contents.
pub async fn write_bytes_file(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    ensure_parent_dir(path).await?;
    let tmp_path = temp_path(path);

    let written = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(())
}

pub async fn load_or_default<T>(path: &Path) -> StorageResult<T>
where
    T: DeserializeOwned + Default,
{
    Ok(read_json_file(path).await?.unwrap_or_default())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", Uuid::new_v4().simple()))
}
