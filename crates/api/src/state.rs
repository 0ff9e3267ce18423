//! Shared application state.
//!
//! One explicit service handle wired at startup and passed through every
//! route; nothing global.

use std::sync::Arc;

use stargate_coordination::republish::StegoRepublisher;
use stargate_coordination::CoordinationService;
use stargate_ingest::scanner::ScannerHandle;
use stargate_ingest::store::{BlockStore, FsBlockStore, IngestionStore};

use crate::content_index::ContentIndex;

/// Authentication material; `None` disables the corresponding check.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Optional API key (`X-API-Key` or `Authorization: Bearer`).
    pub api_key: Option<String>,
    /// HMAC-SHA256 secret for scan callbacks (`STARLIGHT_CALLBACK_SECRET`).
    pub callback_secret: Option<String>,
}

pub struct AppState {
    pub coordination: Arc<CoordinationService>,
    pub ingestions: Arc<dyn IngestionStore>,
    pub blocks: Arc<dyn BlockStore>,
    /// File access for extracted inscription bytes.
    pub block_files: Arc<FsBlockStore>,
    pub scanner: ScannerHandle,
    pub republisher: Option<Arc<StegoRepublisher>>,
    pub content_index: ContentIndex,
    pub auth: AuthConfig,
    pub version: String,
}

impl AppState {
    pub fn new(
        coordination: Arc<CoordinationService>,
        ingestions: Arc<dyn IngestionStore>,
        blocks: Arc<dyn BlockStore>,
        block_files: Arc<FsBlockStore>,
        scanner: ScannerHandle,
    ) -> Self {
        Self {
            coordination,
            ingestions,
            blocks: blocks.clone(),
            block_files,
            scanner,
            republisher: None,
            content_index: ContentIndex::new(blocks),
            auth: AuthConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_republisher(mut self, republisher: Arc<StegoRepublisher>) -> Self {
        self.republisher = Some(republisher);
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }
}
