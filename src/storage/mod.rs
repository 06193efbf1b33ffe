// src/storage/mod.rs

//! Downstream collaborators: the job sink and the recorded index state.
//!
//! The engine hands every built job to a [`JobSink`] and asks an
//! [`IndexingContext`] what was indexed before (for deletions of vanished
//! content and for dependency cascades). Both backends here keep an
//! [`IndexLedger`] of CREATE jobs, updated as jobs pass through.
//!
//! ## Directory Structure (LocalStore)
//!
//! ```text
//! {root}/
//! ├── jobs.jsonl     # every emitted job, one JSON envelope per line
//! └── index.json     # recorded index entries
//! ```

pub mod local;

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{IndexRecord, JobAction, JobEnvelope};

pub use local::LocalStore;

/// Receiver of built jobs.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Queue one job. The flag reports whether it was accepted.
    async fn add_job(&self, envelope: JobEnvelope) -> Result<bool>;

    /// Called once a run over `source` is complete.
    async fn finish(&self, _source: &str, _standalone: bool) -> Result<()> {
        Ok(())
    }
}

/// Read access to previously recorded index state.
#[async_trait]
pub trait IndexingContext: Send + Sync {
    /// Every recorded entry of `object_id`, across sites, locales and environments.
    async fn records_for(
        &self,
        object_id: &str,
        source: &str,
        provider: &str,
    ) -> Result<Vec<IndexRecord>>;

    /// Ids of recorded objects whose dependencies contain any of `paths`.
    async fn dependents_of(
        &self,
        source: &str,
        provider: &str,
        paths: &[String],
    ) -> Result<Vec<String>>;
}

/// Recorded index entries, maintained from the job stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexLedger {
    pub records: Vec<IndexRecord>,
}

impl IndexLedger {
    /// Record a CREATE (replacing the same entry) or drop entries a DELETE removes.
    pub fn apply(&mut self, envelope: &JobEnvelope) {
        match envelope.item.action {
            JobAction::Create => {
                if let Some(record) = IndexRecord::from_envelope(envelope) {
                    self.records.retain(|known| !known.same_entry(&record));
                    self.records.push(record);
                }
            }
            JobAction::Delete => {
                let (source, provider) = (&envelope.source, &envelope.provider);
                self.records.retain(|known| {
                    !(&known.source == source
                        && &known.provider == provider
                        && known.removed_by(&envelope.item))
                });
            }
        }
    }

    pub fn records_for(&self, object_id: &str, source: &str, provider: &str) -> Vec<IndexRecord> {
        self.records
            .iter()
            .filter(|r| r.object_id == object_id && r.source == source && r.provider == provider)
            .cloned()
            .collect()
    }

    /// Distinct dependent ids, in record order.
    pub fn dependents_of(&self, source: &str, provider: &str, paths: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter(|r| r.source == source && r.provider == provider)
            .filter(|r| paths.iter().any(|path| r.dependencies.contains(path)))
            .filter(|r| seen.insert(r.object_id.clone()))
            .map(|r| r.object_id.clone())
            .collect()
    }
}

/// In-process sink and index state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<Vec<JobEnvelope>>,
    ledger: Mutex<IndexLedger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with recorded entries.
    pub fn with_records(records: Vec<IndexRecord>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            ledger: Mutex::new(IndexLedger { records }),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, IndexLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jobs received so far, in arrival order.
    pub fn jobs(&self) -> Vec<JobEnvelope> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn records(&self) -> Vec<IndexRecord> {
        self.ledger().records.clone()
    }
}

#[async_trait]
impl JobSink for MemoryStore {
    async fn add_job(&self, envelope: JobEnvelope) -> Result<bool> {
        self.ledger().apply(&envelope);
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
        Ok(true)
    }
}

#[async_trait]
impl IndexingContext for MemoryStore {
    async fn records_for(
        &self,
        object_id: &str,
        source: &str,
        provider: &str,
    ) -> Result<Vec<IndexRecord>> {
        Ok(self.ledger().records_for(object_id, source, provider))
    }

    async fn dependents_of(
        &self,
        source: &str,
        provider: &str,
        paths: &[String],
    ) -> Result<Vec<String>> {
        Ok(self.ledger().dependents_of(source, provider, paths))
    }
}
