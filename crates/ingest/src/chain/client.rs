use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::chain::{BlockHeaderInfo, ChainTx, MerkleProofResponse};
use crate::error::{IngestError, Result};

/// Transactions returned per page by `/block/:hash/txs/:index`.
const TXS_PAGE_SIZE: usize = 25;

/// Retry configuration for chain API requests
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the delay added or removed at random, 0.0..=1.0.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Esplora-compatible chain API client.
#[derive(Clone)]
pub struct ChainClient {
    base_url: String,
    http: reqwest::Client,
    retry_config: RetryConfig,
}

impl ChainClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry_config(base_url, RetryConfig::default())
    }

    pub fn with_retry_config(base_url: impl Into<String>, retry_config: RetryConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            retry_config,
        }
    }

    /// Execute a request with exponential backoff and jitter.
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut delay_ms = self.retry_config.initial_delay_ms;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() || attempt >= self.retry_config.max_retries {
                        match e.log_level() {
                            tracing::Level::ERROR => {
                                tracing::error!("Request failed after {} attempts: {}", attempt, e)
                            }
                            tracing::Level::WARN => {
                                tracing::warn!("Request failed after {} attempts: {}", attempt, e)
                            }
                            _ => tracing::debug!("Request failed after {} attempts: {}", attempt, e),
                        }
                        return Err(e);
                    }

                    let jittered = jittered_delay(delay_ms, self.retry_config.jitter);
                    debug!(
                        "Request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, self.retry_config.max_retries, jittered, e
                    );

                    tokio::time::sleep(Duration::from_millis(jittered)).await;

                    delay_ms = ((delay_ms as f64) * self.retry_config.backoff_multiplier) as u64;
                    delay_ms = delay_ms.min(self.retry_config.max_delay_ms);
                }
            }
        }
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.http.clone();

        self.retry_request(|| async {
            debug!("GET {}", url);
            let resp = client.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(IngestError::ChainApi {
                    endpoint: url.clone(),
                    status: status.as_u16(),
                    message: body,
                });
            }
            Ok(resp.text().await?)
        })
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.http.clone();

        self.retry_request(|| async {
            debug!("GET {}", url);
            let resp = client.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(IngestError::ChainApi {
                    endpoint: url.clone(),
                    status: status.as_u16(),
                    message: body,
                });
            }
            Ok(resp.json::<T>().await?)
        })
        .await
    }

    /// Current chain tip height.
    ///
    /// Endpoint: `GET /blocks/tip/height`
    pub async fn tip_height(&self) -> Result<u64> {
        let text = self.get_text("/blocks/tip/height").await?;
        text.trim()
            .parse::<u64>()
            .map_err(|_| IngestError::ChainApiInvalidResponse(format!("tip height: {:?}", text)))
    }

    /// Block hash at a given height.
    ///
    /// Endpoint: `GET /block-height/:height`; 404 maps to `BlockNotFound`.
    pub async fn block_hash_at(&self, height: u64) -> Result<String> {
        match self.get_text(&format!("/block-height/{}", height)).await {
            Ok(hash) => Ok(hash.trim().to_string()),
            Err(IngestError::ChainApi { status: 404, .. }) => {
                Err(IngestError::BlockNotFound(height))
            }
            Err(e) => Err(e),
        }
    }

    /// Block header summary.
    ///
    /// Endpoint: `GET /block/:hash`
    pub async fn block_header(&self, hash: &str) -> Result<BlockHeaderInfo> {
        self.get_json(&format!("/block/{}", hash)).await
    }

    /// All transactions of a block, walking the 25-per-page tx listing.
    ///
    /// Endpoint: `GET /block/:hash/txs/:start_index`
    pub async fn block_txs(&self, hash: &str, tx_count: usize) -> Result<Vec<ChainTx>> {
        let mut txs = Vec::with_capacity(tx_count);
        let mut start = 0;

        while start < tx_count {
            let page: Vec<ChainTx> = self
                .get_json(&format!("/block/{}/txs/{}", hash, start))
                .await?;
            if page.is_empty() {
                break;
            }
            start += TXS_PAGE_SIZE;
            txs.extend(page);
        }

        Ok(txs)
    }

    /// One transaction by id; 404 maps to `TxNotFound`.
    ///
    /// Endpoint: `GET /tx/:txid`
    pub async fn tx(&self, txid: &str) -> Result<ChainTx> {
        match self.get_json(&format!("/tx/{}", txid)).await {
            Ok(tx) => Ok(tx),
            Err(IngestError::ChainApi { status: 404, .. }) => {
                Err(IngestError::TxNotFound(txid.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Merkle inclusion proof for a confirmed transaction.
    ///
    /// Endpoint: `GET /tx/:txid/merkle-proof`; 404 maps to `TxNotFound`.
    pub async fn merkle_proof(&self, txid: &str) -> Result<MerkleProofResponse> {
        match self.get_json(&format!("/tx/{}/merkle-proof", txid)).await {
            Ok(proof) => Ok(proof),
            Err(IngestError::ChainApi { status: 404, .. }) => {
                Err(IngestError::TxNotFound(txid.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Transaction ids currently in the mempool.
    ///
    /// Endpoint: `GET /mempool/txids`
    pub async fn mempool_txids(&self) -> Result<Vec<String>> {
        self.get_json("/mempool/txids").await
    }

    /// Confirmed transaction history for a script hash (legacy fallback).
    ///
    /// Endpoint: `GET /scripthash/:hash/txs`
    pub async fn scripthash_txs(&self, script_hash: &str) -> Result<Vec<ChainTx>> {
        self.get_json(&format!("/scripthash/{}/txs", script_hash))
            .await
    }
}

fn jittered_delay(delay_ms: u64, jitter: f64) -> u64 {
    if jitter <= 0.0 {
        return delay_ms;
    }
    let spread = (delay_ms as f64 * jitter).max(1.0);
    let offset = rand::thread_rng().gen_range(-spread..spread);
    (delay_ms as f64 + offset).max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    fn block_json(height: u64) -> serde_json::Value {
        serde_json::json!({
            "id": "0000000000000000000234ce74b6a8b9f0d6a0f0c9a5e9d7e6f1a2b3c4d5e6f7",
            "height": height,
            "timestamp": 1_713_000_000,
            "tx_count": 2,
            "merkle_root": "aa".repeat(32),
        })
    }

    fn tx_json(txid: &str) -> serde_json::Value {
        serde_json::json!({
            "txid": txid,
            "vin": [{ "witness": ["dead", "beef"], "is_coinbase": false }],
            "vout": [{ "scriptpubkey": "0014abcd", "value": 50_000 }],
            "status": { "confirmed": true, "block_height": 840_000 }
        })
    }

    // -----------------------------------------------------------------------
    // tip_height
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_tip_height_parses_plain_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/tip/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("840123\n"))
            .mount(&mock_server)
            .await;

        let client = ChainClient::new(mock_server.uri());
        assert_eq!(client.tip_height().await.unwrap(), 840_123);
    }

    #[tokio::test]
    async fn test_tip_height_garbage_is_invalid_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/tip/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not-a-number"))
            .mount(&mock_server)
            .await;

        let client = ChainClient::with_retry_config(mock_server.uri(), fast_retry());
        let err = client.tip_height().await.unwrap_err();
        assert!(matches!(err, IngestError::ChainApiInvalidResponse(_)));
    }

    // -----------------------------------------------------------------------
    // block lookups
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_block_hash_at_404_maps_to_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/block-height/999999999"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Block not found"))
            .mount(&mock_server)
            .await;

        let client = ChainClient::with_retry_config(mock_server.uri(), fast_retry());
        let err = client.block_hash_at(999_999_999).await.unwrap_err();
        assert!(matches!(err, IngestError::BlockNotFound(999_999_999)));
    }

    #[tokio::test]
    async fn test_block_header_deserializes() {
        let mock_server = MockServer::start().await;
        let hash = "0000000000000000000234ce74b6a8b9f0d6a0f0c9a5e9d7e6f1a2b3c4d5e6f7";
        Mock::given(method("GET"))
            .and(path(format!("/block/{}", hash)))
            .respond_with(ResponseTemplate::new(200).set_body_json(block_json(840_000)))
            .mount(&mock_server)
            .await;

        let client = ChainClient::new(mock_server.uri());
        let header = client.block_header(hash).await.unwrap();
        assert_eq!(header.height, 840_000);
        assert_eq!(header.tx_count, 2);
    }

    #[tokio::test]
    async fn test_block_txs_single_page() {
        let mock_server = MockServer::start().await;
        let hash = "ab".repeat(32);
        Mock::given(method("GET"))
            .and(path(format!("/block/{}/txs/0", hash)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([tx_json("11"), tx_json("22")])),
            )
            .mount(&mock_server)
            .await;

        let client = ChainClient::new(mock_server.uri());
        let txs = client.block_txs(&hash, 2).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].txid, "11");
        assert_eq!(txs[0].vin[0].witness, vec!["dead", "beef"]);
    }

    // -----------------------------------------------------------------------
    // tx + merkle proof
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_tx_404_maps_to_tx_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tx/deadbeef"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Transaction not found"))
            .mount(&mock_server)
            .await;

        let client = ChainClient::with_retry_config(mock_server.uri(), fast_retry());
        let err = client.tx("deadbeef").await.unwrap_err();
        assert!(matches!(err, IngestError::TxNotFound(_)));
    }

    #[tokio::test]
    async fn test_merkle_proof_deserializes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tx/aa11/merkle-proof"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "block_height": 840_000,
                "merkle": ["11".repeat(32), "22".repeat(32)],
                "pos": 3
            })))
            .mount(&mock_server)
            .await;

        let client = ChainClient::new(mock_server.uri());
        let proof = client.merkle_proof("aa11").await.unwrap();
        assert_eq!(proof.block_height, 840_000);
        assert_eq!(proof.merkle.len(), 2);
        assert_eq!(proof.pos, 3);
    }

    // -----------------------------------------------------------------------
    // retry behavior
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_5xx_retried_then_succeeds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/tip/height"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/tip/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1000"))
            .mount(&mock_server)
            .await;

        let cfg = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        };
        let client = ChainClient::with_retry_config(mock_server.uri(), cfg);
        assert_eq!(client.tip_height().await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_404_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tx/feed"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ChainClient::with_retry_config(mock_server.uri(), fast_retry());
        let _ = client.tx("feed").await.unwrap_err();
    }

    #[test]
    fn test_jittered_delay_bounds() {
        for _ in 0..100 {
            let d = jittered_delay(1000, 0.1);
            assert!((900..=1100).contains(&d));
        }
        assert_eq!(jittered_delay(1000, 0.0), 1000);
    }

    #[test]
    fn test_retry_config_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.initial_delay_ms, 1000);
        assert_eq!(cfg.max_delay_ms, 60_000);
        assert!((cfg.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!((cfg.jitter - 0.1).abs() < f64::EPSILON);
    }
}
