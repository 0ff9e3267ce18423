//! Persistence for block artifacts and ingestion records.

pub mod fs;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BlockArtifact, IngestionRecord, IngestionStatus, Metadata};

pub use fs::FsBlockStore;
pub use memory::MemoryIngestionStore;
pub use postgres::{PgBlockStore, PgIngestionStore, PgPoolHandle};

/// Block artifact persistence.  `put` replaces any prior artifact for the
/// same height atomically; readers never observe a torn artifact.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn put(&self, artifact: &BlockArtifact) -> Result<()>;

    async fn get(&self, height: u64) -> Result<Option<BlockArtifact>>;

    /// Known heights, descending.
    async fn heights(&self, limit: usize) -> Result<Vec<u64>>;
}

/// Ingestion record persistence — the dedupe point for wishes.
#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Insert a record; an existing record with the same id is left alone.
    async fn create(&self, record: &IngestionRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<IngestionRecord>>;

    /// The record whose stored image and embedded message both match.
    async fn get_by_image_and_message(
        &self,
        image: &[u8],
        message: &str,
    ) -> Result<Option<IngestionRecord>>;

    /// Shallow metadata merge, last write wins per key.
    async fn update_metadata(&self, id: &str, patch: &Metadata) -> Result<()>;

    /// Rekey a record, only when the new id is not yet taken.  Rekeying to
    /// the same id is a no-op.
    async fn update_id(&self, old: &str, new: &str) -> Result<()>;

    async fn update_status_with_note(
        &self,
        id: &str,
        status: IngestionStatus,
        note: &str,
    ) -> Result<()>;

    /// Reverse-chronological listing, optionally filtered by status.
    async fn list_recent(
        &self,
        status: Option<IngestionStatus>,
        limit: usize,
    ) -> Result<Vec<IngestionRecord>>;
}
