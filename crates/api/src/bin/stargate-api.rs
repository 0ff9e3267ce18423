//! Stargate API Server Binary

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use stargate_api::{telemetry, AppState, AuthConfig, Server, ServerConfig};
use stargate_coordination::config::{CoordConfig, StoreDriver};
use stargate_coordination::funding::{EsploraProvider, FundingConfig, FundingService};
use stargate_coordination::republish::{
    Announcer, HttpAnnouncer, NoopAnnouncer, RepublishConfig, StegoRepublisher,
};
use stargate_coordination::store::{CoordinationStore, MemoryStore, PostgresStore};
use stargate_coordination::{service, CoordinationService};
use stargate_ingest::cas::{Cas, HttpCas, MemoryCas};
use stargate_ingest::config::IngestConfig;
use stargate_ingest::scanner::ScannerHandle;
use stargate_ingest::store::{
    BlockStore, FsBlockStore, IngestionStore, MemoryIngestionStore, PgBlockStore,
    PgIngestionStore, PgPoolHandle,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging (reads RUST_LOG and LOG_FORMAT env vars)
    telemetry::init();

    info!("Starting Stargate API server");

    let coord_config = match CoordConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load coordination configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Coordination store driver.
    let coord_store: Arc<dyn CoordinationStore> = match coord_config.store_driver {
        StoreDriver::Memory => Arc::new(MemoryStore::new()),
        StoreDriver::Postgres => {
            let Some(dsn) = coord_config.database_url.as_deref() else {
                error!("MCP_STORE_DRIVER=postgres requires DATABASE_URL");
                std::process::exit(1);
            };
            let store = match PostgresStore::connect(dsn).await {
                Ok(store) => store,
                Err(e) => {
                    error!("Failed to connect to coordination database: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = store.migrate().await {
                error!("Coordination migrations failed: {}", e);
                std::process::exit(1);
            }
            Arc::new(store)
        }
    };

    let coordination = Arc::new(CoordinationService::with_claim_ttl(
        coord_store,
        chrono::Duration::hours(coord_config.default_claim_ttl_hours),
    ));

    if coord_config.seed_fixtures {
        if let Err(e) = service::seed_fixtures(&coordination).await {
            warn!("Fixture seeding failed: {}", e);
        }
    }

    // Block artifact access for the content endpoint.
    let ingest_config = IngestConfig::from_env().ok();
    let blocks_dir = ingest_config
        .as_ref()
        .map(|c| c.blocks_dir.clone())
        .unwrap_or_else(|| "data/blocks".to_string());
    let block_files = Arc::new(FsBlockStore::new(&blocks_dir));

    let pg_handle = match ingest_config.as_ref().and_then(|c| c.database_url.clone()) {
        Some(dsn) if matches!(
            ingest_config.as_ref().map(|c| c.storage),
            Some(stargate_ingest::config::StorageDriver::Postgres)
        ) =>
        {
            match PgPoolHandle::connect(&dsn).await {
                Ok(handle) => {
                    if let Err(e) = handle.migrate().await {
                        error!("Ingest migrations failed: {}", e);
                        std::process::exit(1);
                    }
                    Some(handle)
                }
                Err(e) => {
                    error!("Failed to connect to ingest database: {}", e);
                    std::process::exit(1);
                }
            }
        }
        _ => None,
    };

    let blocks: Arc<dyn BlockStore> = match &pg_handle {
        Some(handle) => Arc::new(PgBlockStore::new(handle)),
        None => block_files.clone(),
    };
    let ingestions: Arc<dyn IngestionStore> = match &pg_handle {
        Some(handle) => Arc::new(PgIngestionStore::new(handle)),
        None => Arc::new(MemoryIngestionStore::new()),
    };

    // Scanner: remote proxy when configured, stub otherwise.
    let scanner_base = std::env::var("STARGATE_PROXY_BASE").ok();
    let scanner = ScannerHandle::connect(scanner_base.as_deref()).await;

    // Background workers.
    if coord_config.sweep_interval_secs > 0 {
        let sweeper = coordination.clone();
        tokio::spawn(sweeper.run_sweeper(Duration::from_secs(coord_config.sweep_interval_secs)));
    }

    if coord_config.enable_funding_sync {
        match coord_config.funding_api_base.as_deref() {
            Some(api_base) => {
                let provider = Arc::new(EsploraProvider::new(api_base));
                let funding = Arc::new(FundingService::new(
                    coordination.clone(),
                    provider,
                    FundingConfig {
                        interval_secs: coord_config.funding_sync_interval_sec,
                        confirmations_required: coord_config.funding_confirmations,
                        ..Default::default()
                    },
                ));
                tokio::spawn(funding.run());
            }
            None => warn!("MCP_ENABLE_FUNDING_SYNC set without MCP_FUNDING_API_BASE"),
        }
    }

    // Stego republish on approval.
    let approval_enabled = std::env::var("STARGATE_STEGO_APPROVAL_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let mut state = AppState::new(
        coordination.clone(),
        ingestions.clone(),
        blocks,
        block_files,
        scanner.clone(),
    );

    if approval_enabled {
        let cas: Arc<dyn Cas> = match std::env::var("STARGATE_CAS_BASE").ok() {
            Some(base) => Arc::new(HttpCas::new(base)),
            None => Arc::new(MemoryCas::default()),
        };
        let announcer: Arc<dyn Announcer> = match std::env::var("STARGATE_ANNOUNCE_URL").ok() {
            Some(url) => Arc::new(HttpAnnouncer::new(url)),
            None => Arc::new(NoopAnnouncer),
        };
        let env_u64 = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let republish_config = RepublishConfig {
            method: std::env::var("STARGATE_STEGO_METHOD")
                .unwrap_or_else(|_| "alpha".to_string()),
            inscribe_timeout_secs: env_u64("STARGATE_STEGO_INSCRIBE_TIMEOUT_SEC", 60),
            ingest_timeout_secs: env_u64("STARGATE_STEGO_INGEST_TIMEOUT_SEC", 30),
            ingest_poll_secs: env_u64("STARGATE_STEGO_INGEST_POLL_SEC", 2),
            announce_enabled: std::env::var("STARGATE_ANNOUNCE_URL").is_ok(),
            ..Default::default()
        };
        let republisher = Arc::new(StegoRepublisher::new(
            coordination,
            ingestions,
            scanner,
            cas,
            announcer,
            republish_config,
        ));
        state = state.with_republisher(republisher);
    }

    state = state.with_auth(AuthConfig {
        api_key: std::env::var("STARGATE_API_KEY").ok(),
        callback_secret: std::env::var("STARLIGHT_CALLBACK_SECRET").ok(),
    });

    let config = ServerConfig {
        host: std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000),
        enable_cors: true,
    };

    let server = Server::new(config, Arc::new(state));
    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
