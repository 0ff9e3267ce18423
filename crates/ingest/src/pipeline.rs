//! Block ingestion pipeline.
//!
//! Turns one block into a [`BlockArtifact`]: fetch header and transactions,
//! parse witness envelopes into inscriptions, route payloads by MIME,
//! dispatch images to the scanner, and persist the whole artifact as one
//! replacement write.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::inscription::{extract_inscriptions, mime};
use crate::models::{
    BlockArtifact, ContractSighting, ExtractedImage, InscriptionRef, StegoSummary,
};
use crate::paths::sanitize_filename;
use crate::scanner::{ScanOptions, ScanResult, ScannerHandle};
use crate::store::{BlockStore, FsBlockStore};
use crate::vph::{sha256_hex, Vph};

/// One parsed-and-routed inscription, pre-persistence.
struct RoutedInscription {
    reference: InscriptionRef,
    image_bytes: Option<Vec<u8>>,
}

pub struct BlockPipeline {
    chain: ChainClient,
    scanner: ScannerHandle,
    store: Arc<dyn BlockStore>,
    /// Image bytes always land on the filesystem, whatever the artifact driver.
    images: Arc<FsBlockStore>,
    config: IngestConfig,
    scan_limit: Arc<Semaphore>,
}

impl BlockPipeline {
    pub fn new(
        chain: ChainClient,
        scanner: ScannerHandle,
        store: Arc<dyn BlockStore>,
        images: Arc<FsBlockStore>,
        config: IngestConfig,
    ) -> Self {
        let scan_limit = Arc::new(Semaphore::new(config.max_parallel_scans.max(1)));
        Self {
            chain,
            scanner,
            store,
            images,
            config,
            scan_limit,
        }
    }

    /// Ingest one block.  Idempotent: a repeat call replaces the previous
    /// artifact for the height atomically.
    pub async fn process_block(&self, height: u64) -> Result<BlockArtifact> {
        let block_hash = self.chain.block_hash_at(height).await?;

        let fetched = async {
            let header = self.chain.block_header(&block_hash).await?;
            let txs = self.chain.block_txs(&block_hash, header.tx_count).await?;
            Ok::<_, IngestError>((header, txs))
        }
        .await;

        let (header, txs) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                // Never silently dropped: keep a partial artifact on record.
                warn!(height, "Block fetch failed, persisting partial artifact: {}", e);
                let partial = BlockArtifact {
                    block_height: height,
                    block_hash: block_hash.clone(),
                    timestamp: Utc::now(),
                    tx_count: 0,
                    inscriptions: vec![],
                    images: vec![],
                    smart_contracts: vec![],
                    scan_results: vec![],
                    steganography_summary: StegoSummary::default(),
                    success: false,
                };
                self.store.put(&partial).await?;
                return Err(e);
            }
        };

        debug!(height, txs = txs.len(), "Parsing witnesses");

        let mut routed = Vec::new();
        for tx in &txs {
            for (input_index, inscription) in extract_inscriptions(tx) {
                match self
                    .route_inscription(height, &block_hash, &tx.txid, input_index, inscription)
                    .await
                {
                    Ok(r) => routed.push(r),
                    Err(e) => warn!(height, txid = %tx.txid, "Failed to route inscription: {}", e),
                }
            }
        }

        let scan_results = self.scan_images(&routed).await;
        let scanned_at = Utc::now();

        let mut images = Vec::new();
        let mut smart_contracts = Vec::new();
        for (routed_item, scan) in routed.iter().zip(scan_results.iter()) {
            if let Some(bytes) = &routed_item.image_bytes {
                images.push(ExtractedImage {
                    tx_id: routed_item.reference.tx_id.clone(),
                    input_index: routed_item.reference.input_index,
                    file_name: routed_item
                        .reference
                        .file_name
                        .clone()
                        .unwrap_or_else(|| "file".to_string()),
                    file_path: routed_item.reference.file_path.clone().unwrap_or_default(),
                    content_type: routed_item.reference.content_type.clone(),
                    size_bytes: routed_item.reference.size_bytes,
                });

                if let Some(message) = scan
                    .as_ref()
                    .and_then(|s| s.extracted_message.as_deref())
                {
                    smart_contracts.push(ContractSighting {
                        tx_id: routed_item.reference.tx_id.clone(),
                        visible_pixel_hash: Vph::compute(bytes, message).to_string(),
                        message_preview: message.chars().take(120).collect(),
                    });
                }
            }
        }

        let artifact = BlockArtifact {
            block_height: height,
            block_hash,
            timestamp: chrono::DateTime::from_timestamp(header.timestamp, 0)
                .unwrap_or_else(Utc::now),
            tx_count: txs.len(),
            inscriptions: routed.into_iter().map(|r| r.reference).collect(),
            images,
            smart_contracts,
            steganography_summary: StegoSummary::from_results(&scan_results, scanned_at),
            scan_results,
            success: true,
        };

        self.store.put(&artifact).await?;
        info!(
            height,
            inscriptions = artifact.inscriptions.len(),
            stego = artifact.steganography_summary.stego_count,
            "Block ingested"
        );
        Ok(artifact)
    }

    /// Route a parsed inscription by normalized MIME type.
    async fn route_inscription(
        &self,
        height: u64,
        block_hash: &str,
        tx_id: &str,
        input_index: u32,
        inscription: crate::inscription::ParsedInscription,
    ) -> Result<RoutedInscription> {
        let fallback_name = format!("{}_{}", tx_id, input_index);

        let content_type = mime::normalize_content_type(
            inscription.content_type.as_deref(),
            None,
            &inscription.body,
        );

        let extension = extension_for(&content_type);
        let file_name = sanitize_filename(&format!("{}.{}", fallback_name, extension));

        if mime::is_image(&content_type) {
            let file_path = self
                .images
                .write_image(height, block_hash, &file_name, &inscription.body)
                .await?;
            return Ok(RoutedInscription {
                reference: InscriptionRef {
                    tx_id: tx_id.to_string(),
                    input_index,
                    content_type,
                    file_name: Some(file_name),
                    file_path: Some(file_path),
                    size_bytes: inscription.body.len() as u64,
                    content: None,
                    content_hash: Some(sha256_hex(&inscription.body)),
                },
                image_bytes: Some(inscription.body),
            });
        }

        let body: &[u8] = if mime::is_text(&content_type) {
            mime::strip_trailing_terminator(&inscription.body)
        } else {
            &inscription.body
        };

        if mime::is_text(&content_type) && body.len() <= self.config.inline_content_max_bytes {
            return Ok(RoutedInscription {
                reference: InscriptionRef {
                    tx_id: tx_id.to_string(),
                    input_index,
                    content_type,
                    file_name: None,
                    file_path: None,
                    size_bytes: body.len() as u64,
                    content: Some(String::from_utf8_lossy(body).into_owned()),
                    content_hash: None,
                },
                image_bytes: None,
            });
        }

        // Large or binary payload: file-backed with an integrity hash.
        let file_path = self
            .images
            .write_image(height, block_hash, &file_name, body)
            .await?;
        Ok(RoutedInscription {
            reference: InscriptionRef {
                tx_id: tx_id.to_string(),
                input_index,
                content_type,
                file_name: Some(file_name),
                file_path: Some(file_path),
                size_bytes: body.len() as u64,
                content: None,
                content_hash: Some(sha256_hex(body)),
            },
            image_bytes: None,
        })
    }

    /// Scan extracted images, bounded by the scan semaphore, results aligned
    /// positionally with the routed inscriptions.
    async fn scan_images(&self, routed: &[RoutedInscription]) -> Vec<Option<ScanResult>> {
        let mut handles = Vec::with_capacity(routed.len());

        for item in routed {
            let Some(bytes) = item.image_bytes.clone() else {
                handles.push(None);
                continue;
            };

            let scanner = self.scanner.clone();
            let limit = self.scan_limit.clone();
            let timeout = Duration::from_secs(self.config.scan_timeout_secs);
            handles.push(Some(tokio::spawn(async move {
                let _permit = limit.acquire_owned().await.expect("semaphore closed");
                match tokio::time::timeout(
                    timeout,
                    scanner.scan_image(&bytes, &ScanOptions::default()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => ScanResult::scan_error("scan timed out"),
                }
            })));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Some(join) => match join.await {
                    Ok(result) => results.push(Some(result)),
                    Err(e) => {
                        error!("Scan task panicked: {}", e);
                        results.push(Some(ScanResult::scan_error("scan task failed")));
                    }
                },
                None => results.push(None),
            }
        }
        results
    }

    async fn join_block_tasks(joins: Vec<tokio::task::JoinHandle<()>>) {
        for outcome in futures::future::join_all(joins).await {
            if let Err(e) = outcome {
                error!("Block ingestion task panicked: {}", e);
            }
        }
    }

    /// Poll the chain tip and ingest new blocks with bounded concurrency.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!("Starting block ingestion loop");

        let mut last_processed = self
            .store
            .heights(1)
            .await
            .ok()
            .and_then(|h| h.first().copied());

        loop {
            match self.chain.tip_height().await {
                Ok(tip) => {
                    let target = tip.saturating_sub(self.config.confirm_lag);
                    let from = last_processed.map(|h| h + 1).unwrap_or(target);

                    if from <= target {
                        self.process_range(from, target).await;
                        last_processed = Some(target);
                    }
                }
                Err(e) => {
                    error!("Failed to read chain tip: {}", e);
                    // Keep polling despite errors.
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }
    }

    async fn process_range(self: &Arc<Self>, from: u64, to: u64) {
        let block_limit = Arc::new(Semaphore::new(self.config.max_parallel_blocks.max(1)));
        let mut joins = Vec::new();

        for height in from..=to {
            let pipeline = self.clone();
            let limit = block_limit.clone();
            joins.push(tokio::spawn(async move {
                let _permit = limit.acquire_owned().await.expect("semaphore closed");
                if let Err(e) = pipeline.process_block(height).await {
                    match e {
                        IngestError::BlockNotFound(_) => {
                            debug!(height, "Block not yet available")
                        }
                        other => error!(height, "Block ingestion failed: {}", other),
                    }
                }
            }));
        }

        Self::join_block_tasks(joins).await;
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "text/html" => "html",
        "text/markdown" => "md",
        "text/plain" => "txt",
        "application/json" => "json",
        "application/yaml" => "yaml",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::StubScanner;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OP_IF: u8 = 0x63;
    const OP_ENDIF: u8 = 0x68;

    fn push(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        match data.len() {
            0 => out.push(0x00),
            n if n <= 75 => {
                out.push(n as u8);
                out.extend_from_slice(data);
            }
            n => {
                out.push(0x4c);
                out.push(n as u8);
                out.extend_from_slice(data);
            }
        }
        out
    }

    fn envelope(content_type: &str, body: &[u8]) -> String {
        let mut script = vec![0x00, OP_IF];
        script.extend(push(b"ord"));
        script.extend(push(&[0x01]));
        script.extend(push(content_type.as_bytes()));
        script.extend(push(&[]));
        script.extend(push(body));
        script.push(OP_ENDIF);
        hex::encode(script)
    }

    fn test_config(blocks_dir: &std::path::Path) -> IngestConfig {
        IngestConfig {
            chain_api_base: "unused".to_string(),
            blocks_dir: blocks_dir.to_string_lossy().into_owned(),
            uploads_dir: blocks_dir.to_string_lossy().into_owned(),
            storage: crate::config::StorageDriver::Filesystem,
            database_url: None,
            poll_interval_secs: 1,
            confirm_lag: 0,
            max_parallel_blocks: 2,
            max_parallel_scans: 2,
            scan_timeout_secs: 5,
            scanner_base: None,
            inline_content_max_bytes: 1024 * 1024,
        }
    }

    async fn mount_block(server: &MockServer, height: u64, hash: &str, txs: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/block-height/{}", height)))
            .respond_with(ResponseTemplate::new(200).set_body_string(hash))
            .mount(server)
            .await;
        let tx_count = txs.as_array().map(|a| a.len()).unwrap_or(0);
        Mock::given(method("GET"))
            .and(path(format!("/block/{}", hash)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": hash,
                "height": height,
                "timestamp": 1_713_000_000,
                "tx_count": tx_count,
                "merkle_root": "aa".repeat(32),
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/block/{}/txs/0", hash)))
            .respond_with(ResponseTemplate::new(200).set_body_json(txs))
            .mount(server)
            .await;
    }

    fn pipeline_for(server_uri: String, dir: &std::path::Path) -> BlockPipeline {
        let store = Arc::new(FsBlockStore::new(dir));
        let images = Arc::new(FsBlockStore::new(dir));
        BlockPipeline::new(
            ChainClient::new(server_uri),
            ScannerHandle::new(Arc::new(StubScanner)),
            store,
            images,
            test_config(dir),
        )
    }

    #[tokio::test]
    async fn test_process_block_text_inscription_inlined() {
        let server = MockServer::start().await;
        let hash = "f0".repeat(32);
        let txid = "11".repeat(32);
        mount_block(
            &server,
            840_000,
            &hash,
            serde_json::json!([{
                "txid": txid,
                "vin": [{ "witness": [envelope("text/plain", b"Task: write spec\nBudget: 500")] }],
                "vout": [],
                "status": {}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(server.uri(), dir.path());

        let artifact = pipeline.process_block(840_000).await.unwrap();
        assert!(artifact.success);
        assert_eq!(artifact.inscriptions.len(), 1);
        assert_eq!(artifact.inscriptions[0].content_type, "text/plain");
        assert_eq!(
            artifact.inscriptions[0].content.as_deref(),
            Some("Task: write spec\nBudget: 500")
        );
        // Text payloads are not scanned.
        assert_eq!(artifact.scan_results, vec![None]);
        assert!(artifact.validate());
    }

    #[tokio::test]
    async fn test_process_block_image_persisted_and_scanned() {
        let server = MockServer::start().await;
        let hash = "f1".repeat(32);
        let txid = "22".repeat(32);
        mount_block(
            &server,
            840_001,
            &hash,
            serde_json::json!([{
                "txid": txid,
                "vin": [{ "witness": [envelope("image/png", b"\x89PNG-fake-bytes")] }],
                "vout": [],
                "status": {}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(server.uri(), dir.path());

        let artifact = pipeline.process_block(840_001).await.unwrap();
        assert_eq!(artifact.images.len(), 1);
        assert_eq!(artifact.scan_results.len(), 1);
        let scan = artifact.scan_results[0].as_ref().unwrap();
        assert_eq!(scan.prediction, "clean");

        // Image bytes landed under the block's images directory.
        let image = &artifact.images[0];
        assert!(image.file_path.starts_with(&format!("840001_{}", hash)));
        let stored = FsBlockStore::new(dir.path())
            .read_relative(&image.file_path)
            .await
            .unwrap();
        assert_eq!(stored, b"\x89PNG-fake-bytes");
    }

    #[tokio::test]
    async fn test_process_block_is_idempotent() {
        let server = MockServer::start().await;
        let hash = "f2".repeat(32);
        mount_block(
            &server,
            840_002,
            &hash,
            serde_json::json!([{
                "txid": "33".repeat(32),
                "vin": [{ "witness": [envelope("text/plain", b"hello")] }],
                "vout": [],
                "status": {}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(server.uri(), dir.path());

        let first = pipeline.process_block(840_002).await.unwrap();
        let second = pipeline.process_block(840_002).await.unwrap();
        assert_eq!(first.inscriptions, second.inscriptions);

        let store = FsBlockStore::new(dir.path());
        let stored = store.get(840_002).await.unwrap().unwrap();
        assert_eq!(stored.inscriptions.len(), 1);
    }

    #[tokio::test]
    async fn test_process_block_missing_surfaces_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/block-height/999"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Block not found"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(server.uri(), dir.path());
        let err = pipeline.process_block(999).await.unwrap_err();
        assert!(matches!(err, IngestError::BlockNotFound(999)));
        // NotFound is surfaced, not recorded as a partial artifact.
        let store = FsBlockStore::new(dir.path());
        assert!(store.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_block_fetch_failure_keeps_partial_artifact() {
        let server = MockServer::start().await;
        let hash = "f3".repeat(32);
        Mock::given(method("GET"))
            .and(path("/block-height/840003"))
            .respond_with(ResponseTemplate::new(200).set_body_string(hash.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/block/{}", hash)))
            .respond_with(ResponseTemplate::new(400).set_body_string("broken"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(server.uri(), dir.path());

        assert!(pipeline.process_block(840_003).await.is_err());
        let stored = FsBlockStore::new(dir.path())
            .get(840_003)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.success);
        assert_eq!(stored.block_hash, hash);
    }

    #[tokio::test]
    async fn test_traversal_filename_never_escapes() {
        // Content-type driven filenames are synthesized from txid, so this
        // exercises the vault directly with a hostile name.
        let dir = tempfile::tempdir().unwrap();
        let vault = FsBlockStore::new(dir.path());
        let rel = vault
            .write_image(1, "aa", "../../../etc/passwd", b"X")
            .await
            .unwrap();
        assert!(!rel.contains(".."));
        assert!(dir.path().join(&rel).exists());
    }
}
