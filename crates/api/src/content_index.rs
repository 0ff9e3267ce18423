//! Transaction-id → block-height index for the content endpoint.
//!
//! Built lazily from persisted block artifacts and refreshed on miss, so a
//! freshly ingested block becomes servable without restarts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use stargate_ingest::store::BlockStore;
use stargate_ingest::Result;

/// Heights scanned per refresh pass.
const REFRESH_SCAN_LIMIT: usize = 2048;

#[derive(Clone)]
pub struct ContentIndex {
    blocks: Arc<dyn BlockStore>,
    map: Arc<RwLock<HashMap<String, u64>>>,
}

impl ContentIndex {
    pub fn new(blocks: Arc<dyn BlockStore>) -> Self {
        Self {
            blocks,
            map: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Height of the block carrying `tx_id`, refreshing the index on miss.
    pub async fn height_for(&self, tx_id: &str) -> Result<Option<u64>> {
        let normalized = tx_id.trim().to_lowercase();

        if let Some(height) = self.map.read().await.get(&normalized).copied() {
            return Ok(Some(height));
        }

        self.refresh().await?;
        Ok(self.map.read().await.get(&normalized).copied())
    }

    /// Rescan known artifacts into the index.
    pub async fn refresh(&self) -> Result<()> {
        let heights = self.blocks.heights(REFRESH_SCAN_LIMIT).await?;
        let mut map = self.map.write().await;

        for height in heights {
            let Some(artifact) = self.blocks.get(height).await? else {
                continue;
            };
            for inscription in &artifact.inscriptions {
                map.entry(inscription.tx_id.to_lowercase())
                    .or_insert(height);
            }
        }

        debug!(entries = map.len(), "Content index refreshed");
        Ok(())
    }
}
