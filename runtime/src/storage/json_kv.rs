use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::KvStorage;
use super::io::{ensure_parent_dir, load_or_default, write_json_file};

type Record = Map<String, Value>;

#[derive(Clone, Debug)]
pub struct JsonKvStorageConfig {
    pub working_dir: PathBuf,
    pub namespace: String,
    pub workspace: Option<String>,
}

/// Collection of json objects kept in memory and flushed to a single file.
///
/// Every stored object carries `_id` (its key), `create_time` (kept across
/// overwrites) and `update_time`, both unix seconds.
pub struct JsonKvStorage {
    label: String,
    file_path: PathBuf,
    records: RwLock<HashMap<String, Record>>,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl JsonKvStorage {
    pub fn new(config: JsonKvStorageConfig) -> Self {
        let dir = match config.workspace.as_deref() {
            Some(ws) if !ws.is_empty() => config.working_dir.join(ws),
            _ => config.working_dir.clone(),
        };
        let label = format!(
            "{}_{}",
            config.workspace.as_deref().filter(|ws| !ws.is_empty()).unwrap_or("_"),
            config.namespace
        );

        Self {
            label,
            file_path: dir.join(format!("kv_store_{}.json", config.namespace)),
            records: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn stamp(key: &str, value: Value, previous: Option<&Record>, now: i64) -> Result<Record> {
        let Value::Object(mut record) = value else {
            bail!("value for key {key} is not a json object");
        };

        if !record.contains_key("create_time") {
            let created = previous
                .and_then(|prev| prev.get("create_time"))
                .cloned()
                .unwrap_or_else(|| now.into());
            record.insert("create_time".into(), created);
        }
        record.insert("update_time".into(), now.into());
        record.insert("_id".into(), key.into());
        Ok(record)
    }
}

#[async_trait]
impl KvStorage for JsonKvStorage {
    async fn initialize(&self) -> Result<()> {
        ensure_parent_dir(&self.file_path).await?;
        let loaded: HashMap<String, Record> = load_or_default(&self.file_path)
            .await
            .with_context(|| format!("failed to load kv store {}", self.label))?;
        debug!(store = %self.label, records = loaded.len(), "kv store loaded");

        *self.records.write().await = loaded;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        self.sync_if_dirty().await
    }

    async fn upsert(&self, values: HashMap<String, Value>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let now = Utc::now().timestamp();
        let mut records = self.records.write().await;
        // validate the whole batch before touching the map
        let mut stamped = Vec::with_capacity(values.len());
        for (key, value) in values {
            let record = Self::stamp(&key, value, records.get(&key), now)
                .with_context(|| format!("rejected upsert into {}", self.label))?;
            stamped.push((key, record));
        }
        records.extend(stamped);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        for id in ids {
            records.remove(id);
        }
        if records.len() != before {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        {
            let mut records = self.records.write().await;
            if records.is_empty() {
                return Ok(());
            }
            records.clear();
        }
        self.dirty.store(true, Ordering::SeqCst);
        self.sync_if_dirty().await
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .map(|(key, record)| (key.clone(), Value::Object(record.clone())))
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Value>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned().map(Value::Object))
    }

    async fn sync_if_dirty(&self) -> Result<()> {
        // held across swap + write so a caller only returns once its data is on disk
        let _flush = self.flush_lock.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = self.records.read().await.clone();
        if let Err(err) = write_json_file(&self.file_path, &snapshot).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(err).with_context(|| format!("failed to write kv store {}", self.label));
        }
        debug!(store = %self.label, records = snapshot.len(), "kv store flushed");
        Ok(())
    }
}
