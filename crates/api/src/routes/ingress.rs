//! Inscription ingress and scan callbacks.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, info, warn};

use stargate_ingest::models::meta::keys;
use stargate_ingest::models::{IngestionRecord, IngestionStatus, Metadata};
use stargate_ingest::vph::Vph;
use stargate_ingest::IngestError;

use crate::error::{ApiError, Result};
use crate::middleware::{verify_callback_signature, SIGNATURE_HEADER};
use crate::models::{Envelope, IngressRequest, ScanCallbackRequest};
use crate::state::AppState;

/// Summary of an ingestion record for API responses; image bytes stay out
/// of the envelope.
#[derive(Debug, serde::Serialize)]
pub struct IngressResponse {
    pub id: String,
    pub status: String,
    pub visible_pixel_hash: String,
    pub deduplicated: bool,
}

/// Accept a wish: dedupe by (image, message) and key the record by VPH.
pub async fn ingest_inscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngressRequest>,
) -> Result<Json<Envelope<IngressResponse>>> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&body.image_base64)
        .map_err(|e| ApiError::BadRequest(format!("image_base64: {}", e)))?;
    if image_bytes.is_empty() {
        return Err(ApiError::BadRequest("image_base64 is empty".to_string()));
    }

    // At most one record per (image, message) pair.
    if let Some(existing) = state
        .ingestions
        .get_by_image_and_message(&image_bytes, &body.message)
        .await?
    {
        debug!(id = %existing.id, "Ingress dedupe hit");
        return Ok(Json(Envelope::new(IngressResponse {
            id: existing.id.clone(),
            status: existing.status.as_str().to_string(),
            visible_pixel_hash: existing
                .metadata
                .get(keys::VISIBLE_PIXEL_HASH)
                .and_then(|v| v.as_str())
                .unwrap_or(&existing.id)
                .to_string(),
            deduplicated: true,
        })));
    }

    let vph = Vph::compute(&image_bytes, &body.message);

    let mut metadata = Metadata::new();
    metadata.insert(keys::EMBEDDED_MESSAGE.to_string(), body.message.clone().into());
    metadata.insert(
        keys::VISIBLE_PIXEL_HASH.to_string(),
        vph.as_str().to_string().into(),
    );
    if let Some(method) = &body.method {
        metadata.insert(keys::STEGO_METHOD.to_string(), method.clone().into());
    }

    let record = IngestionRecord::new(
        vph.as_str(),
        body.filename.as_deref().unwrap_or("inscription.png"),
        body.method.as_deref().unwrap_or("alpha"),
        &body.image_base64,
        metadata,
    )?;
    state.ingestions.create(&record).await?;

    info!(id = %vph, "Ingestion record created");
    Ok(Json(Envelope::new(IngressResponse {
        id: vph.to_string(),
        status: IngestionStatus::Pending.as_str().to_string(),
        visible_pixel_hash: vph.to_string(),
        deduplicated: false,
    })))
}

/// Scan callback: HMAC-verified metadata merge, promoting provisional ids
/// to the VPH exactly once.
pub async fn scan_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<IngressResponse>>> {
    if let Some(secret) = state.auth.callback_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing callback signature".to_string()))?;
        verify_callback_signature(secret, &body, signature)?;
    }

    let callback: ScanCallbackRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("callback body: {}", e)))?;

    let record = state
        .ingestions
        .get(&callback.ingestion_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("ingestion {}", callback.ingestion_id)))?;

    let mut patch = Metadata::new();
    if let Some(method) = &callback.method {
        patch.insert(keys::STEGO_METHOD.to_string(), method.clone().into());
    }
    if let Some(is_stego) = callback.is_stego {
        patch.insert("scan_is_stego".to_string(), is_stego.into());
    }
    if let Some(confidence) = callback.confidence {
        patch.insert(
            "scan_confidence".to_string(),
            stargate_ingest::models::MetaValue::Float(confidence),
        );
    }

    let mut record_id = record.id.clone();
    let mut vph_str = record
        .metadata
        .get(keys::VISIBLE_PIXEL_HASH)
        .and_then(|v| v.as_str())
        .map(str::to_string);

    // An extracted message fixes the record's canonical identity.
    if let Some(message) = &callback.extracted_message {
        let vph = Vph::compute(&record.image_bytes, message);
        patch.insert(keys::EMBEDDED_MESSAGE.to_string(), message.clone().into());
        patch.insert(
            keys::VISIBLE_PIXEL_HASH.to_string(),
            vph.as_str().to_string().into(),
        );
        vph_str = Some(vph.as_str().to_string());

        if record.id != vph.as_str() {
            match state.ingestions.update_id(&record.id, vph.as_str()).await {
                Ok(()) => {
                    info!(old = %record.id, new = %vph, "Ingestion record promoted to VPH");
                    record_id = vph.to_string();
                }
                Err(IngestError::DuplicateRecord(_)) => {
                    // The canonical record already exists; keep merging into it.
                    warn!(old = %record.id, new = %vph, "VPH already taken, merging metadata");
                    record_id = vph.to_string();
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    state.ingestions.update_metadata(&record_id, &patch).await?;
    state
        .ingestions
        .update_status_with_note(&record_id, IngestionStatus::Validated, "scan callback")
        .await?;

    let updated = state
        .ingestions
        .get(&record_id)
        .await?
        .ok_or_else(|| ApiError::Internal("record vanished during callback".to_string()))?;

    Ok(Json(Envelope::new(IngressResponse {
        id: updated.id.clone(),
        status: updated.status.as_str().to_string(),
        visible_pixel_hash: vph_str.unwrap_or_else(|| updated.id.clone()),
        deduplicated: false,
    })))
}

/// Recent ingestion records.
pub async fn list_ingestions(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(params): axum::extract::Query<crate::models::EventListParams>,
) -> Result<Json<Envelope<Vec<IngressResponse>>>> {
    let records = state
        .ingestions
        .list_recent(None, params.limit.unwrap_or(50))
        .await?;
    let summaries = records
        .into_iter()
        .map(|r| IngressResponse {
            visible_pixel_hash: r
                .metadata
                .get(keys::VISIBLE_PIXEL_HASH)
                .and_then(|v| v.as_str())
                .unwrap_or(&r.id)
                .to_string(),
            status: r.status.as_str().to_string(),
            id: r.id,
            deduplicated: false,
        })
        .collect();
    Ok(Json(Envelope::new(summaries)))
}
