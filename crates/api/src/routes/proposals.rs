//! Proposal endpoints: creation, approval, publication

use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use stargate_coordination::markdown;
use stargate_coordination::models::{Contract, Proposal, ProposalStatus};
use stargate_ingest::models::meta::{keys, MetadataExt};
use stargate_ingest::models::Metadata;
use stargate_ingest::vph::Vph;

use crate::error::{ApiError, Result};
use crate::models::{CreateProposalRequest, Envelope, EventListParams};
use crate::state::AppState;

/// Create a proposal, either derived from an ingestion record or explicit.
pub async fn create_proposal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProposalRequest>,
) -> Result<Json<Envelope<Proposal>>> {
    let proposal = match body.from_ingestion_id.as_deref() {
        Some(ingestion_id) => from_ingestion(&state, ingestion_id).await?,
        None => explicit(body)?,
    };

    let created = state.coordination.create_proposal(proposal).await?;
    Ok(Json(Envelope::new(created)))
}

async fn from_ingestion(state: &AppState, ingestion_id: &str) -> Result<Proposal> {
    let record = state
        .ingestions
        .get(ingestion_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("ingestion {}", ingestion_id)))?;

    let message = record
        .embedded_message()
        .ok_or_else(|| {
            ApiError::BadRequest(format!("ingestion {} has no embedded message", ingestion_id))
        })?
        .to_string();

    let vph = match record.metadata.visible_pixel_hash() {
        Some(vph) => Vph::parse(vph)?,
        None => Vph::compute(&record.image_bytes, &message),
    };

    let plan = markdown::parse_plan(&message);
    let title = plan
        .tasks
        .first()
        .map(|t| t.title.clone())
        .unwrap_or_else(|| format!("Wish {}", vph.short()));

    let mut metadata = Metadata::new();
    metadata.insert(keys::INGESTION_ID.to_string(), record.id.clone().into());
    metadata.insert(keys::EMBEDDED_MESSAGE.to_string(), message.clone().into());
    metadata.insert(
        keys::VISIBLE_PIXEL_HASH.to_string(),
        vph.as_str().to_string().into(),
    );

    Ok(Proposal {
        id: format!("prop-{}", vph.short()),
        title,
        description_md: message,
        visible_pixel_hash: vph.to_string(),
        budget_sats: plan.total_budget_sats,
        tasks: vec![],
        metadata,
        status: ProposalStatus::Pending,
        created_at: chrono::Utc::now(),
    })
}

fn explicit(body: CreateProposalRequest) -> Result<Proposal> {
    let vph = body
        .visible_pixel_hash
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("visible_pixel_hash is required".to_string()))?;
    let vph = Vph::parse(vph)?;
    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?;

    Ok(Proposal {
        id: format!("prop-{}", uuid::Uuid::new_v4()),
        title,
        description_md: body.description_md.unwrap_or_default(),
        visible_pixel_hash: vph.to_string(),
        budget_sats: body.budget_sats.unwrap_or_default(),
        tasks: vec![],
        metadata: Metadata::new(),
        status: ProposalStatus::Pending,
        created_at: chrono::Utc::now(),
    })
}

/// One proposal by id.
pub async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Proposal>>> {
    let proposal = state.coordination.get_proposal(&id).await?;
    Ok(Json(Envelope::new(proposal)))
}

/// Recent proposals.
pub async fn list_proposals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventListParams>,
) -> Result<Json<Envelope<Vec<Proposal>>>> {
    let proposals = state
        .coordination
        .list_proposals(None, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(Envelope::new(proposals)))
}

/// Approve a proposal: upserts the contract and tasks, then drives the
/// stego republish when enabled.  Republish failures do not roll back the
/// approval; the operation retries safely through the republish endpoint.
pub async fn approve_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Contract>>> {
    let contract = state.coordination.approve_proposal(&id).await?;
    info!(proposal = %id, contract = %contract.contract_id, "Proposal approved");

    if let Some(republisher) = &state.republisher {
        if let Err(e) = republisher.republish(&id).await {
            warn!(proposal = %id, "Stego republish failed after approval: {}", e);
        }
    }

    Ok(Json(Envelope::new(contract)))
}

/// Re-run the stego republish for an approved proposal.
pub async fn republish_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>> {
    let republisher = state
        .republisher
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("stego republish is disabled".to_string()))?;

    let outcome = republisher.republish(&id).await?;
    Ok(Json(Envelope::new(serde_json::json!({
        "payload_cid": outcome.payload_cid,
        "stego_cid": outcome.stego_cid,
        "contract_id": outcome.contract_id,
        "request_id": outcome.request_id,
        "performed": outcome.performed,
    }))))
}

/// Publish an approved proposal.
pub async fn publish_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Proposal>>> {
    let proposal = state.coordination.publish_proposal(&id).await?;
    Ok(Json(Envelope::new(proposal)))
}

/// Reject a proposal.
pub async fn reject_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Proposal>>> {
    let proposal = state.coordination.reject_proposal(&id).await?;
    Ok(Json(Envelope::new(proposal)))
}
