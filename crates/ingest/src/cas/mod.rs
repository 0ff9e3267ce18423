//! Content-addressed storage.
//!
//! Payloads and stego images are pinned by digest; the HTTP client talks to
//! an IPFS-style pinning endpoint, the memory implementation backs tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::vph::sha256_hex;

/// Content-addressed store: pin bytes, get a content id back.
#[async_trait]
pub trait Cas: Send + Sync {
    async fn pin(&self, bytes: &[u8], label: &str) -> Result<String>;

    async fn get(&self, cid: &str) -> Result<Vec<u8>>;
}

/// HTTP pinning client.
#[derive(Clone)]
pub struct HttpCas {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct PinResponse {
    cid: String,
}

impl HttpCas {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Cas for HttpCas {
    async fn pin(&self, bytes: &[u8], label: &str) -> Result<String> {
        let url = format!("{}/api/v0/add?label={}", self.base_url, label);
        debug!("Pinning {} bytes as {:?}", bytes.len(), label);

        let resp = self
            .http
            .post(&url)
            .body(bytes.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IngestError::Cas(format!(
                "pin failed: {} {}",
                status.as_u16(),
                message
            )));
        }

        let pinned: PinResponse = resp.json().await?;
        Ok(pinned.cid)
    }

    async fn get(&self, cid: &str) -> Result<Vec<u8>> {
        let url = format!("{}/api/v0/cat/{}", self.base_url, cid);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::Cas(format!(
                "cat failed for {}: {}",
                cid,
                status.as_u16()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// In-memory CAS keyed by SHA-256 of contents.
#[derive(Default)]
pub struct MemoryCas {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl Cas for MemoryCas {
    async fn pin(&self, bytes: &[u8], _label: &str) -> Result<String> {
        let cid = sha256_hex(bytes);
        self.blobs
            .lock()
            .expect("cas lock poisoned")
            .insert(cid.clone(), bytes.to_vec());
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .expect("cas lock poisoned")
            .get(cid)
            .cloned()
            .ok_or_else(|| IngestError::Cas(format!("unknown cid: {}", cid)))
    }
}
