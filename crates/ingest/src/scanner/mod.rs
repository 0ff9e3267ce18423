//! Steganography scanner adapter.
//!
//! The scanner is an external collaborator reached through the
//! [`StegoScanner`] trait: a remote proxy in production, an in-process stub
//! when the remote cannot be initialized.  [`ScannerHandle`] owns the
//! circuit breaker and is the only entry point callers use.

pub mod breaker;
pub mod remote;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{IngestError, Result};
pub use breaker::{BreakerState, CircuitBreaker};
pub use remote::RemoteScanner;
pub use stub::StubScanner;

/// Options for a scan call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    #[serde(default)]
    pub extract_message: bool,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub include_metadata: bool,
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extract_message: true,
            confidence_threshold: default_confidence_threshold(),
            include_metadata: false,
        }
    }
}

/// Verdict for one scanned image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub is_stego: bool,
    pub stego_probability: f64,
    pub confidence: f64,
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stego_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

impl ScanResult {
    /// The short-circuit verdict emitted while the breaker is open.
    pub fn circuit_open() -> Self {
        Self {
            is_stego: false,
            stego_probability: 0.0,
            confidence: 0.0,
            prediction: "circuit_breaker_open".to_string(),
            stego_type: None,
            extracted_message: None,
            extraction_error: None,
        }
    }

    /// Verdict recorded when a scan call failed outright.
    pub fn scan_error(message: impl Into<String>) -> Self {
        Self {
            is_stego: false,
            stego_probability: 0.0,
            confidence: 0.0,
            prediction: "error".to_string(),
            stego_type: None,
            extracted_message: None,
            extraction_error: Some(message.into()),
        }
    }
}

/// Result of a whole-block scan on the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockScanResponse {
    pub block_height: u64,
    pub results: Vec<ScanResult>,
}

/// Result of a direct message-extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub message_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub method_used: String,
    pub method_confidence: f64,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Result of an embed call.
#[derive(Debug, Clone)]
pub struct EmbedResult {
    pub stego_bytes: Vec<u8>,
    pub request_id: String,
}

/// Scanner service identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub model_loaded: bool,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

/// Uniform interface over the remote scanner and the in-process stub.
#[async_trait]
pub trait StegoScanner: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn scan_image(&self, image: &[u8], options: &ScanOptions) -> Result<ScanResult>;

    async fn scan_block(&self, height: u64, options: &ScanOptions) -> Result<BlockScanResponse>;

    async fn extract_message(&self, image: &[u8], method: &str) -> Result<ExtractionResult>;

    async fn embed(
        &self,
        cover: &[u8],
        method: &str,
        message: &[u8],
        filename: &str,
    ) -> Result<EmbedResult>;

    async fn info(&self) -> Result<ScannerInfo>;
}

/// Service handle owning the scanner variant and its circuit breaker.
///
/// Scan calls degrade to flagged verdicts rather than erroring so block
/// ingestion continues; embed calls surface failures to the caller.
#[derive(Clone)]
pub struct ScannerHandle {
    inner: Arc<dyn StegoScanner>,
    breaker: Arc<CircuitBreaker>,
}

impl ScannerHandle {
    pub fn new(inner: Arc<dyn StegoScanner>) -> Self {
        Self {
            inner,
            breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn with_breaker(inner: Arc<dyn StegoScanner>, breaker: CircuitBreaker) -> Self {
        Self {
            inner,
            breaker: Arc::new(breaker),
        }
    }

    /// Install the remote scanner when it initializes, the stub otherwise.
    pub async fn connect(base_url: Option<&str>) -> Self {
        if let Some(base) = base_url {
            let remote = RemoteScanner::new(base);
            match remote.initialize().await {
                Ok(()) => return Self::new(Arc::new(remote)),
                Err(e) => {
                    warn!("Remote scanner unavailable, falling back to stub: {}", e);
                }
            }
        }
        Self::new(Arc::new(StubScanner::default()))
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Scan an image; never fails.  Breaker-open and scan failures come back
    /// as flagged verdicts.
    pub async fn scan_image(&self, image: &[u8], options: &ScanOptions) -> ScanResult {
        if !self.breaker.allow() {
            return ScanResult::circuit_open();
        }

        match self.inner.scan_image(image, options).await {
            Ok(result) => {
                self.breaker.record_success();
                result
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!("Scan failed: {}", e);
                ScanResult::scan_error(e.to_string())
            }
        }
    }

    pub async fn extract_message(&self, image: &[u8], method: &str) -> Result<ExtractionResult> {
        if !self.breaker.allow() {
            return Err(IngestError::CircuitOpen);
        }
        match self.inner.extract_message(image, method).await {
            Ok(r) => {
                self.breaker.record_success();
                Ok(r)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    /// Embed a message into a cover image.  Unlike scans, failures propagate.
    pub async fn embed(
        &self,
        cover: &[u8],
        method: &str,
        message: &[u8],
        filename: &str,
    ) -> Result<EmbedResult> {
        if !self.breaker.allow() {
            return Err(IngestError::CircuitOpen);
        }
        match self.inner.embed(cover, method, message, filename).await {
            Ok(r) => {
                self.breaker.record_success();
                Ok(r)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    pub async fn info(&self) -> Result<ScannerInfo> {
        self.inner.info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scanner that always fails, for breaker tests.
    struct FailingScanner {
        calls: AtomicU32,
    }

    #[async_trait]
    impl StegoScanner for FailingScanner {
        async fn initialize(&self) -> Result<()> {
            Err(IngestError::Scanner("down".to_string()))
        }

        async fn scan_image(&self, _: &[u8], _: &ScanOptions) -> Result<ScanResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(IngestError::Scanner("down".to_string()))
        }

        async fn scan_block(&self, _: u64, _: &ScanOptions) -> Result<BlockScanResponse> {
            Err(IngestError::Scanner("down".to_string()))
        }

        async fn extract_message(&self, _: &[u8], _: &str) -> Result<ExtractionResult> {
            Err(IngestError::Scanner("down".to_string()))
        }

        async fn embed(&self, _: &[u8], _: &str, _: &[u8], _: &str) -> Result<EmbedResult> {
            Err(IngestError::Scanner("down".to_string()))
        }

        async fn info(&self) -> Result<ScannerInfo> {
            Err(IngestError::Scanner("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_scan_failures_open_breaker_and_short_circuit() {
        let failing = Arc::new(FailingScanner {
            calls: AtomicU32::new(0),
        });
        let handle = ScannerHandle::with_breaker(
            failing.clone(),
            CircuitBreaker::new(3, Duration::from_secs(30)),
        );

        // Three failures trip the breaker.
        for _ in 0..3 {
            let r = handle.scan_image(b"img", &ScanOptions::default()).await;
            assert_eq!(r.prediction, "error");
        }
        assert_eq!(handle.breaker_state(), BreakerState::Open);

        // Further calls short-circuit without touching the scanner.
        let before = failing.calls.load(Ordering::SeqCst);
        let r = handle.scan_image(b"img", &ScanOptions::default()).await;
        assert_eq!(r.prediction, "circuit_breaker_open");
        assert!(!r.is_stego);
        assert_eq!(failing.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_embed_through_open_breaker_errors() {
        let handle = ScannerHandle::with_breaker(
            Arc::new(FailingScanner {
                calls: AtomicU32::new(0),
            }),
            CircuitBreaker::new(1, Duration::from_secs(30)),
        );
        let _ = handle.embed(b"c", "alpha", b"m", "f.png").await;
        let err = handle.embed(b"c", "alpha", b"m", "f.png").await.unwrap_err();
        assert!(matches!(err, IngestError::CircuitOpen));
    }

    #[tokio::test]
    async fn test_connect_falls_back_to_stub() {
        let handle = ScannerHandle::connect(None).await;
        let r = handle.scan_image(b"img", &ScanOptions::default()).await;
        assert_eq!(r.prediction, "clean");
        assert!(!r.is_stego);
    }
}
