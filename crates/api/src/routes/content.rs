//! Content endpoint: serve inscription payloads by transaction id.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use stargate_ingest::models::InscriptionRef;
use stargate_ingest::vph::sha256_hex;

use crate::error::{ApiError, Result};
use crate::models::{ContentManifest, ContentParams, ManifestPart};
use crate::state::AppState;

/// Raw payload bytes with integrity headers.
pub async fn get_raw(
    State(state): State<Arc<AppState>>,
    Path(tx_id): Path<String>,
    Query(params): Query<ContentParams>,
) -> Result<impl IntoResponse> {
    let (_, parts) = lookup_parts(&state, &tx_id).await?;

    let part = match params.witness_index {
        Some(index) => parts
            .iter()
            .find(|p| p.input_index == index)
            .ok_or_else(|| {
                ApiError::NotFound(format!("no inscription at witness index {}", index))
            })?,
        None => parts
            .first()
            .ok_or_else(|| ApiError::NotFound(format!("no inscriptions for tx {}", tx_id)))?,
    };

    let bytes = load_bytes(&state, part).await?;
    let hash = sha256_hex(&bytes);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&part.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        "X-Inscription-Mime",
        HeaderValue::from_str(&part.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        "X-Inscription-Size",
        HeaderValue::from_str(&bytes.len().to_string())
            .unwrap_or(HeaderValue::from_static("0")),
    );
    headers.insert(
        "X-Inscription-Hash",
        HeaderValue::from_str(&hash).unwrap_or(HeaderValue::from_static("")),
    );

    Ok((headers, bytes))
}

/// JSON manifest of all inscription parts for a transaction.
pub async fn get_manifest(
    State(state): State<Arc<AppState>>,
    Path(tx_id): Path<String>,
) -> Result<Json<ContentManifest>> {
    let (block_height, parts) = lookup_parts(&state, &tx_id).await?;

    let mut manifest_parts = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let hash = match &part.content_hash {
            Some(hash) => hash.clone(),
            None => sha256_hex(&load_bytes(&state, part).await?),
        };
        manifest_parts.push(ManifestPart {
            witness_index: part.input_index,
            size_bytes: part.size_bytes,
            mime_type: part.content_type.clone(),
            hash,
            primary: i == 0,
            url: format!("/content/{}?witness_index={}", tx_id, part.input_index),
        });
    }

    let stitch_hint = if manifest_parts.len() > 1 {
        "concat_by_witness_index"
    } else {
        "single"
    };

    Ok(Json(ContentManifest {
        tx_id: tx_id.to_lowercase(),
        block_height,
        parts: manifest_parts,
        stitch_hint: stitch_hint.to_string(),
    }))
}

async fn lookup_parts(
    state: &AppState,
    tx_id: &str,
) -> Result<(u64, Vec<InscriptionRef>)> {
    let height = state
        .content_index
        .height_for(tx_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tx {}", tx_id)))?;

    let artifact = state
        .blocks
        .get(height)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("block {}", height)))?;

    let normalized = tx_id.trim().to_lowercase();
    let mut parts: Vec<InscriptionRef> = artifact
        .inscriptions
        .into_iter()
        .filter(|i| i.tx_id.to_lowercase() == normalized)
        .collect();
    parts.sort_by_key(|p| p.input_index);

    if parts.is_empty() {
        return Err(ApiError::NotFound(format!("tx {}", tx_id)));
    }
    Ok((height, parts))
}

async fn load_bytes(state: &AppState, part: &InscriptionRef) -> Result<Vec<u8>> {
    if let Some(content) = &part.content {
        return Ok(content.clone().into_bytes());
    }
    let path = part
        .file_path
        .as_deref()
        .ok_or_else(|| ApiError::Internal("inscription has neither content nor path".to_string()))?;
    Ok(state.block_files.read_relative(path).await?)
}
