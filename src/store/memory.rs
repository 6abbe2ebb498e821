//! In-memory [`ManifestStore`] for tests and embedding.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{next_id, ManifestStore};
use crate::error::{Error, Result};
use crate::models::ManifestRecord;

/// Manifest log held in a `Vec` behind a `RwLock`; lost on drop.
#[derive(Default)]
pub struct InMemoryManifestStore {
    records: RwLock<Vec<ManifestRecord>>,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

const POISONED: &str = "manifest log lock poisoned";

#[async_trait]
impl ManifestStore for InMemoryManifestStore {
    async fn append(&self, payload: &serde_json::Value) -> Result<ManifestRecord> {
        let mut records = self.records.write().map_err(|_| Error::Fault(POISONED))?;
        let record = ManifestRecord {
            id: next_id(records.last().map(|r| r.id)),
            payload: payload.clone(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn current(&self) -> Result<Option<ManifestRecord>> {
        let records = self.records.read().map_err(|_| Error::Fault(POISONED))?;
        Ok(records.iter().max_by_key(|r| r.id).cloned())
    }

    async fn history(&self, limit: usize) -> Result<Vec<ManifestRecord>> {
        let records = self.records.read().map_err(|_| Error::Fault(POISONED))?;
        let mut out: Vec<ManifestRecord> = records.clone();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out.truncate(limit);
        Ok(out)
    }
}
