//! Stargate Ingest Binary
//!
//! Main entry point for the block ingestion service.

use std::process;
use std::sync::Arc;

use tracing::{error, info};

use stargate_ingest::chain::ChainClient;
use stargate_ingest::config::{IngestConfig, StorageDriver};
use stargate_ingest::pipeline::BlockPipeline;
use stargate_ingest::scanner::ScannerHandle;
use stargate_ingest::store::{BlockStore, FsBlockStore, PgBlockStore, PgPoolHandle};

#[tokio::main]
async fn main() {
    // Initialize structured logging (reads RUST_LOG and LOG_FORMAT env vars)
    stargate_ingest::telemetry::init();

    info!("Starting Stargate ingest");

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let store: Arc<dyn BlockStore> = match config.storage {
        StorageDriver::Filesystem => Arc::new(FsBlockStore::new(&config.blocks_dir)),
        StorageDriver::Postgres => {
            let Some(dsn) = config.database_url.as_deref() else {
                error!("STARGATE_STORAGE=postgres requires STARGATE_PG_DSN or DATABASE_URL");
                process::exit(1);
            };
            let handle = match PgPoolHandle::connect(dsn).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = handle.migrate().await {
                error!("Failed to run migrations: {}", e);
                process::exit(1);
            }
            Arc::new(PgBlockStore::new(&handle))
        }
    };

    let chain = ChainClient::new(&config.chain_api_base);
    let scanner = ScannerHandle::connect(config.scanner_base.as_deref()).await;
    let images = Arc::new(FsBlockStore::new(&config.blocks_dir));

    let pipeline = Arc::new(BlockPipeline::new(chain, scanner, store, images, config));

    info!("Starting block ingestion loop");
    if let Err(e) = pipeline.run().await {
        error!("Pipeline error: {}", e);
        process::exit(1);
    }
}
