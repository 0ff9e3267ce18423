use serde::Deserialize;

/// Coordination store driver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordConfig {
    /// Store backend (env: `MCP_STORE_DRIVER`).
    #[serde(default = "default_store_driver", alias = "mcp_store_driver")]
    pub store_driver: StoreDriver,

    /// Postgres connection string (env: `DATABASE_URL`).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Claim TTL in hours (env: `MCP_DEFAULT_CLAIM_TTL_HOURS`).
    #[serde(default = "default_claim_ttl_hours", alias = "mcp_default_claim_ttl_hours")]
    pub default_claim_ttl_hours: i64,

    /// Seed demo fixtures at startup (env: `MCP_SEED_FIXTURES`).
    #[serde(default, alias = "mcp_seed_fixtures")]
    pub seed_fixtures: bool,

    /// Claim expiry sweep cadence in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Funding sync toggle (env: `MCP_ENABLE_FUNDING_SYNC`).
    #[serde(default, alias = "mcp_enable_funding_sync")]
    pub enable_funding_sync: bool,

    /// Funding sweep cadence (env: `MCP_FUNDING_SYNC_INTERVAL_SEC`).
    #[serde(
        default = "default_funding_interval_secs",
        alias = "mcp_funding_sync_interval_sec"
    )]
    pub funding_sync_interval_sec: u64,

    /// Funding provider name (env: `MCP_FUNDING_PROVIDER`).
    #[serde(default = "default_funding_provider", alias = "mcp_funding_provider")]
    pub funding_provider: String,

    /// Funding provider API base (env: `MCP_FUNDING_API_BASE`).
    #[serde(default, alias = "mcp_funding_api_base")]
    pub funding_api_base: Option<String>,

    /// Confirmations required to confirm a proof (env: `MCP_FUNDING_CONFIRMATIONS`).
    #[serde(
        default = "default_funding_confirmations",
        alias = "mcp_funding_confirmations"
    )]
    pub funding_confirmations: u64,
}

fn default_store_driver() -> StoreDriver {
    StoreDriver::Memory
}

fn default_claim_ttl_hours() -> i64 {
    72
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_funding_interval_secs() -> u64 {
    60
}

fn default_funding_provider() -> String {
    "esplora".to_string()
}

fn default_funding_confirmations() -> u64 {
    6
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            store_driver: default_store_driver(),
            database_url: None,
            default_claim_ttl_hours: default_claim_ttl_hours(),
            seed_fixtures: false,
            sweep_interval_secs: default_sweep_interval_secs(),
            enable_funding_sync: false,
            funding_sync_interval_sec: default_funding_interval_secs(),
            funding_provider: default_funding_provider(),
            funding_api_base: None,
            funding_confirmations: default_funding_confirmations(),
        }
    }
}

impl CoordConfig {
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        cfg.try_deserialize()
    }

    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CoordConfig::default();
        assert_eq!(cfg.store_driver, StoreDriver::Memory);
        assert_eq!(cfg.default_claim_ttl_hours, 72);
        assert_eq!(cfg.funding_sync_interval_sec, 60);
        assert_eq!(cfg.funding_confirmations, 6);
        assert!(!cfg.seed_fixtures);
        assert!(!cfg.enable_funding_sync);
    }

    #[test]
    fn test_driver_deserialize() {
        let d: StoreDriver = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(d, StoreDriver::Postgres);
    }
}
