//! API request and response models

use serde::{Deserialize, Serialize};

/// Success envelope: `{"success":true,"data":...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

/// Inscription ingress request.
#[derive(Debug, Deserialize)]
pub struct IngressRequest {
    pub message: String,
    pub image_base64: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Scan callback payload, verified against `X-Starlight-Signature`.
#[derive(Debug, Deserialize)]
pub struct ScanCallbackRequest {
    pub ingestion_id: String,
    #[serde(default)]
    pub extracted_message: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub is_stego: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Claim request body.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub ai_identifier: String,
    #[serde(default)]
    pub estimated_completion: Option<String>,
}

/// Submission request body.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub deliverables: serde_json::Value,
    #[serde(default)]
    pub completion_proof: serde_json::Value,
}

/// Review request body; `action` is one of `review`, `approve`, `reject`.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rework request body.
#[derive(Debug, Deserialize)]
pub struct ReworkRequest {
    #[serde(default)]
    pub deliverables: Option<serde_json::Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Proposal creation: either derived from an ingestion record or explicit.
#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    #[serde(default)]
    pub from_ingestion_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description_md: Option<String>,
    #[serde(default)]
    pub budget_sats: Option<u64>,
    #[serde(default)]
    pub visible_pixel_hash: Option<String>,
}

/// Query parameters for task listings.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListParams {
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameters for contract listings.
#[derive(Debug, Default, Deserialize)]
pub struct ContractListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameters for event listings.
#[derive(Debug, Default, Deserialize)]
pub struct EventListParams {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameter for raw content fetches.
#[derive(Debug, Default, Deserialize)]
pub struct ContentParams {
    #[serde(default)]
    pub witness_index: Option<u32>,
}

/// One part in a content manifest.
#[derive(Debug, Serialize)]
pub struct ManifestPart {
    pub witness_index: u32,
    pub size_bytes: u64,
    pub mime_type: String,
    pub hash: String,
    pub primary: bool,
    pub url: String,
}

/// Content manifest for a transaction.
#[derive(Debug, Serialize)]
pub struct ContentManifest {
    pub tx_id: String,
    pub block_height: u64,
    pub parts: Vec<ManifestPart>,
    pub stitch_hint: String,
}
