//! Remote steganography scanner, reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::scanner::{
    BlockScanResponse, EmbedResult, ExtractionResult, ScanOptions, ScanResult, ScannerInfo,
    StegoScanner,
};

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[derive(Serialize)]
struct ScanRequest<'a> {
    image_base64: String,
    #[serde(flatten)]
    options: &'a ScanOptions,
}

#[derive(Serialize)]
struct ExtractRequest {
    image_base64: String,
    method: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    cover_base64: String,
    method: String,
    message_base64: String,
    filename: String,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    stego_base64: String,
    request_id: String,
}

/// HTTP adapter for the remote scanner service.
#[derive(Clone)]
pub struct RemoteScanner {
    base_url: String,
    http: reqwest::Client,
    max_retries: u32,
}

impl RemoteScanner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            max_retries: 3,
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        let mut delay_ms = 500u64;

        loop {
            debug!("POST {}", url);
            let outcome = async {
                let resp = self.http.post(&url).json(body).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(IngestError::ChainApi {
                        endpoint: url.clone(),
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(resp.json::<T>().await?)
            }
            .await;

            match outcome {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.max_retries {
                        return Err(e);
                    }
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(5000);
                }
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IngestError::ChainApi {
                endpoint: url,
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl StegoScanner for RemoteScanner {
    async fn initialize(&self) -> Result<()> {
        let info: ScannerInfo = self.get_json("/api/info").await?;
        if !info.model_loaded {
            return Err(IngestError::Scanner(
                "remote scanner has no model loaded".to_string(),
            ));
        }
        Ok(())
    }

    async fn scan_image(&self, image: &[u8], options: &ScanOptions) -> Result<ScanResult> {
        self.post_json(
            "/api/scan",
            &ScanRequest {
                image_base64: b64(image),
                options,
            },
        )
        .await
    }

    async fn scan_block(&self, height: u64, options: &ScanOptions) -> Result<BlockScanResponse> {
        self.post_json(&format!("/api/scan_block/{}", height), options)
            .await
    }

    async fn extract_message(&self, image: &[u8], method: &str) -> Result<ExtractionResult> {
        self.post_json(
            "/api/extract",
            &ExtractRequest {
                image_base64: b64(image),
                method: method.to_string(),
            },
        )
        .await
    }

    async fn embed(
        &self,
        cover: &[u8],
        method: &str,
        message: &[u8],
        filename: &str,
    ) -> Result<EmbedResult> {
        let resp: EmbedResponse = self
            .post_json(
                "/api/embed",
                &EmbedRequest {
                    cover_base64: b64(cover),
                    method: method.to_string(),
                    message_base64: b64(message),
                    filename: filename.to_string(),
                },
            )
            .await?;

        let stego_bytes = base64::engine::general_purpose::STANDARD
            .decode(&resp.stego_base64)
            .map_err(|e| IngestError::Scanner(format!("embed response base64: {}", e)))?;

        Ok(EmbedResult {
            stego_bytes,
            request_id: resp.request_id,
        })
    }

    async fn info(&self) -> Result<ScannerInfo> {
        self.get_json("/api/info").await
    }
}
