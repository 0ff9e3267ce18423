use serde::Deserialize;

/// Storage backend selection for block artifacts and ingestion records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Filesystem,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Esplora-compatible chain API base URL, e.g. `https://blockstream.info/api`
    pub chain_api_base: String,

    /// Root directory for persisted block artifacts (env: `BLOCKS_DIR`).
    #[serde(default = "default_blocks_dir", alias = "data_dir")]
    pub blocks_dir: String,

    /// Root directory for extracted inscription images (env: `UPLOADS_DIR`).
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Block artifact storage backend (env: `STARGATE_STORAGE`).
    #[serde(default = "default_storage", alias = "stargate_storage")]
    pub storage: StorageDriver,

    /// Postgres connection string (env: `STARGATE_PG_DSN` or `DATABASE_URL`).
    #[serde(default, alias = "stargate_pg_dsn")]
    pub database_url: Option<String>,

    /// Poll interval for new chain tips.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Process blocks this many confirmations behind the tip.
    #[serde(default = "default_confirm_lag")]
    pub confirm_lag: u64,

    /// Max blocks processed in parallel.
    #[serde(default = "default_max_parallel_blocks")]
    pub max_parallel_blocks: usize,

    /// Max scanner calls in flight per block.
    #[serde(default = "default_max_parallel_scans")]
    pub max_parallel_scans: usize,

    /// Per-call scanner timeout in seconds.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Remote steganography scanner base URL (env: `STARGATE_PROXY_BASE`).
    #[serde(default, alias = "stargate_proxy_base")]
    pub scanner_base: Option<String>,

    /// Inline content cap in bytes; larger payloads are file-backed.
    #[serde(default = "default_inline_content_max_bytes")]
    pub inline_content_max_bytes: usize,
}

fn default_blocks_dir() -> String {
    "data/blocks".to_string()
}

fn default_uploads_dir() -> String {
    "data/uploads".to_string()
}

fn default_storage() -> StorageDriver {
    StorageDriver::Filesystem
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_confirm_lag() -> u64 {
    1
}

fn default_max_parallel_blocks() -> usize {
    4
}

fn default_max_parallel_scans() -> usize {
    8
}

fn default_scan_timeout_secs() -> u64 {
    120
}

fn default_inline_content_max_bytes() -> usize {
    1024 * 1024
}

impl IngestConfig {
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        cfg.try_deserialize()
    }

    /// Convenience constructor from environment variables.
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_poll_interval_secs(), 30);
        assert_eq!(default_max_parallel_blocks(), 4);
        assert_eq!(default_max_parallel_scans(), 8);
        assert_eq!(default_scan_timeout_secs(), 120);
        assert_eq!(default_inline_content_max_bytes(), 1024 * 1024);
        assert_eq!(default_storage(), StorageDriver::Filesystem);
    }

    #[test]
    fn test_storage_driver_deserialize() {
        let d: StorageDriver = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(d, StorageDriver::Postgres);
        let d: StorageDriver = serde_json::from_str("\"filesystem\"").unwrap();
        assert_eq!(d, StorageDriver::Filesystem);
    }
}
