//! In-process stub scanner used when the remote cannot be initialized.
//!
//! Returns deterministic clean verdicts so the ingestion pipeline keeps
//! running with the same call contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::scanner::{
    BlockScanResponse, EmbedResult, ExtractionResult, ScanOptions, ScanResult, ScannerInfo,
    StegoScanner,
};

#[derive(Debug, Default, Clone)]
pub struct StubScanner;

impl StubScanner {
    fn clean_verdict() -> ScanResult {
        ScanResult {
            is_stego: false,
            stego_probability: 0.0,
            confidence: 0.99,
            prediction: "clean".to_string(),
            stego_type: None,
            extracted_message: None,
            extraction_error: None,
        }
    }
}

#[async_trait]
impl StegoScanner for StubScanner {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn scan_image(&self, _image: &[u8], _options: &ScanOptions) -> Result<ScanResult> {
        Ok(Self::clean_verdict())
    }

    async fn scan_block(&self, height: u64, _options: &ScanOptions) -> Result<BlockScanResponse> {
        Ok(BlockScanResponse {
            block_height: height,
            results: Vec::new(),
        })
    }

    async fn extract_message(&self, _image: &[u8], method: &str) -> Result<ExtractionResult> {
        Ok(ExtractionResult {
            message_found: false,
            message: None,
            method_used: method.to_string(),
            method_confidence: 0.0,
            details: serde_json::Value::Null,
        })
    }

    async fn embed(
        &self,
        cover: &[u8],
        _method: &str,
        _message: &[u8],
        _filename: &str,
    ) -> Result<EmbedResult> {
        // No codec in-process; the cover passes through unchanged.
        Ok(EmbedResult {
            stego_bytes: cover.to_vec(),
            request_id: format!("stub-{}", Uuid::new_v4()),
        })
    }

    async fn info(&self) -> Result<ScannerInfo> {
        Ok(ScannerInfo {
            model_loaded: false,
            model_version: Some("stub".to_string()),
            model_path: None,
            device: Some("cpu".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_scan_is_deterministic_clean() {
        let stub = StubScanner;
        let a = stub.scan_image(b"x", &ScanOptions::default()).await.unwrap();
        let b = stub.scan_image(b"y", &ScanOptions::default()).await.unwrap();
        assert_eq!(a, b);
        assert!(!a.is_stego);
        assert_eq!(a.prediction, "clean");
    }

    #[tokio::test]
    async fn test_stub_embed_passes_cover_through() {
        let stub = StubScanner;
        let out = stub.embed(b"COVER", "alpha", b"msg", "a.png").await.unwrap();
        assert_eq!(out.stego_bytes, b"COVER");
        assert!(out.request_id.starts_with("stub-"));
    }
}
