//! In-memory ingestion record store.
//!
//! Default driver for tests and single-process deployments.  All writes,
//! rekeys included, go through one `RwLock` writer so `update_id` cannot
//! interleave with metadata merges on the same record.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{IngestError, Result};
use crate::models::meta::MetadataExt;
use crate::models::{IngestionRecord, IngestionStatus, Metadata};
use crate::store::IngestionStore;

#[derive(Default)]
pub struct MemoryIngestionStore {
    records: RwLock<HashMap<String, IngestionRecord>>,
}

impl MemoryIngestionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestionStore for MemoryIngestionStore {
    async fn create(&self, record: &IngestionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(record.id.clone()).or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<IngestionRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn get_by_image_and_message(
        &self,
        image: &[u8],
        message: &str,
    ) -> Result<Option<IngestionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| {
                r.image_bytes == image && r.metadata.embedded_message() == Some(message)
            })
            .cloned())
    }

    async fn update_metadata(&self, id: &str, patch: &Metadata) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| IngestError::RecordNotFound(id.to_string()))?;
        for (k, v) in patch {
            record.metadata.insert(k.clone(), v.clone());
        }
        if let Some(message) = record.metadata.embedded_message() {
            record.message_length = message.len();
        }
        Ok(())
    }

    async fn update_id(&self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let mut records = self.records.write().await;
        if records.contains_key(new) {
            return Err(IngestError::DuplicateRecord(new.to_string()));
        }
        let mut record = records
            .remove(old)
            .ok_or_else(|| IngestError::RecordNotFound(old.to_string()))?;
        record.id = new.to_string();
        records.insert(new.to_string(), record);
        Ok(())
    }

    async fn update_status_with_note(
        &self,
        id: &str,
        status: IngestionStatus,
        note: &str,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| IngestError::RecordNotFound(id.to_string()))?;
        record.status = status;
        record.status_note = Some(note.to_string());
        Ok(())
    }

    async fn list_recent(
        &self,
        status: Option<IngestionStatus>,
        limit: usize,
    ) -> Result<Vec<IngestionRecord>> {
        let records = self.records.read().await;
        let mut out: Vec<IngestionRecord> = records
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }
}
