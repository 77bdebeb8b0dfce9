//! In-process [`BlobStore`] used by hosts without a database and by tests.

use crate::error::{LibraryError, Result};
use crate::models::{CachedTrackRecord, CachedTrackSummary};
use crate::repositories::BlobStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryBlobStore {
    records: RwLock<HashMap<String, CachedTrackRecord>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn sorted<T>(&self, map: impl Fn(&CachedTrackRecord) -> T) -> Vec<T> {
        let records = self.records.read();
        let mut entries: Vec<&CachedTrackRecord> = records.values().collect();
        entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        entries.into_iter().map(map).collect()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, id: &str) -> Result<Option<CachedTrackRecord>> {
        Ok(self
            .records
            .read()
            .get(id)
            .filter(|record| !record.payload.is_empty())
            .cloned())
    }

    async fn put(&self, record: &CachedTrackRecord) -> Result<()> {
        record
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "cached_track".to_string(),
                message,
            })?;
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().remove(id).is_some())
    }

    async fn has_payload(&self, id: &str) -> Result<bool> {
        Ok(self
            .records
            .read()
            .get(id)
            .is_some_and(|record| !record.payload.is_empty()))
    }

    async fn list_all(&self) -> Result<Vec<CachedTrackRecord>> {
        Ok(self.sorted(Clone::clone))
    }

    async fn list_summaries(&self) -> Result<Vec<CachedTrackSummary>> {
        Ok(self.sorted(CachedTrackRecord::summary))
    }

    async fn total_size(&self) -> Result<u64> {
        Ok(self.records.read().values().map(|r| r.file_size).sum())
    }

    async fn set_last_played(&self, id: &str, timestamp_ms: i64) -> Result<bool> {
        match self.records.write().get_mut(id) {
            Some(record) => {
                record.last_played_at = Some(timestamp_ms);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_cover_art(&self, id: &str, cover_art: Option<String>) -> Result<bool> {
        match self.records.write().get_mut(id) {
            Some(record) => {
                record.cover_art = cover_art;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cover_art(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .read()
            .get(id)
            .and_then(|record| record.cover_art.clone()))
    }

    async fn clear(&self) -> Result<u64> {
        let mut records = self.records.write();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
