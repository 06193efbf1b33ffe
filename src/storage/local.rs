// src/storage/local.rs

//! Local filesystem sink and index state.
//!
//! Jobs are appended to `jobs.jsonl` as they arrive; the ledger lives in
//! memory and is written to `index.json` when a run finishes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{IndexRecord, JobEnvelope};
use crate::storage::{IndexLedger, IndexingContext, JobSink};

const JOBS_FILE: &str = "jobs.jsonl";
const INDEX_FILE: &str = "index.json";

/// Filesystem-backed store rooted at a directory.
pub struct LocalStore {
    root_dir: PathBuf,
    ledger: Mutex<IndexLedger>,
}

impl LocalStore {
    /// Open the store, loading `index.json` when present.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            root_dir: root_dir.into(),
            ledger: Mutex::new(IndexLedger::default()),
        };
        if let Some(ledger) = store.read_json::<IndexLedger>(INDEX_FILE).await? {
            log::info!(
                "Loaded {} index records from {:?}",
                ledger.records.len(),
                store.path(INDEX_FILE)
            );
            *store.ledger.lock().await = ledger;
        }
        Ok(store)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn append_line(&self, key: &str, line: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    /// Every job written so far.
    pub async fn load_jobs(&self) -> Result<Vec<JobEnvelope>> {
        let Some(bytes) = self.read_bytes(JOBS_FILE).await? else {
            return Ok(Vec::new());
        };
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AppError::from))
            .collect()
    }

    /// Persist the ledger to `index.json`.
    pub async fn save_index(&self) -> Result<()> {
        let ledger = self.ledger.lock().await.clone();
        self.write_json(INDEX_FILE, &ledger).await?;
        log::info!("Index ledger: {} records written", ledger.records.len());
        Ok(())
    }
}

#[async_trait]
impl JobSink for LocalStore {
    async fn add_job(&self, envelope: JobEnvelope) -> Result<bool> {
        let line = serde_json::to_vec(&envelope)?;
        self.append_line(JOBS_FILE, &line)
            .await
            .map_err(|e| AppError::sink(format!("cannot append job: {e}")))?;
        self.ledger.lock().await.apply(&envelope);
        Ok(true)
    }

    async fn finish(&self, source: &str, standalone: bool) -> Result<()> {
        log::info!(
            "Finished {} run for source '{}'",
            if standalone { "standalone" } else { "full" },
            source
        );
        self.save_index().await
    }
}

#[async_trait]
impl IndexingContext for LocalStore {
    async fn records_for(
        &self,
        object_id: &str,
        source: &str,
        provider: &str,
    ) -> Result<Vec<IndexRecord>> {
        Ok(self
            .ledger
            .lock()
            .await
            .records_for(object_id, source, provider))
    }

    async fn dependents_of(
        &self,
        source: &str,
        provider: &str,
        paths: &[String],
    ) -> Result<Vec<String>> {
        Ok(self.ledger.lock().await.dependents_of(source, provider, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ID_ATTR, JobAction, JobItem};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create(object_id: &str) -> JobEnvelope {
        let mut item = JobItem {
            action: JobAction::Create,
            sites: vec!["wknd-author".into()],
            locale: "en_US".into(),
            attributes: serde_json::Map::new(),
            environment: "authoring".into(),
            checksum: Some("1700000000000".into()),
            specs: Vec::new(),
        };
        item.push_attribute(ID_ATTR, object_id);
        JobEnvelope {
            item,
            source: "wknd".into(),
            provider: "AEM".into(),
            dependencies: BTreeSet::new(),
            standalone: true,
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        store.write_bytes("test.txt", b"hello").await.unwrap();
        let data = store.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(store.read_bytes("nope.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_jobs_appended_as_lines() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        store.add_job(create("/content/a")).await.unwrap();
        store.add_job(create("/content/b")).await.unwrap();

        let jobs = store.load_jobs().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].item.object_id(), Some("/content/b"));
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = LocalStore::open(tmp.path()).await.unwrap();
            store.add_job(create("/content/a")).await.unwrap();
            store.finish("wknd", true).await.unwrap();
        }

        let store = LocalStore::open(tmp.path()).await.unwrap();
        let records = store.records_for("/content/a", "wknd", "AEM").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].checksum, "1700000000000");
    }
}
