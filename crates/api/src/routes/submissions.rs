//! Submission endpoints: submit, review, rework

use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use stargate_coordination::models::Submission;
use stargate_coordination::ReviewAction;

use crate::error::Result;
use crate::models::{Envelope, ReviewRequest, ReworkRequest, SubmitRequest};
use crate::state::AppState;

/// Submit deliverables against a claim; the task moves to `submitted`.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(claim_id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<Envelope<Submission>>> {
    let submission = state
        .coordination
        .submit(&claim_id, body.deliverables, body.completion_proof)
        .await?;
    Ok(Json(Envelope::new(submission)))
}

/// One submission by id.
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Submission>>> {
    let submission = state.coordination.get_submission(&id).await?;
    Ok(Json(Envelope::new(submission)))
}

/// Record a review verdict.
pub async fn review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Envelope<Submission>>> {
    let action = ReviewAction::parse(&body.action)?;
    let submission = state.coordination.review(&id, action, body.notes).await?;
    Ok(Json(Envelope::new(submission)))
}

/// Rework a rejected submission back to `pending_review`.
pub async fn rework(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReworkRequest>,
) -> Result<Json<Envelope<Submission>>> {
    let submission = state
        .coordination
        .rework(&id, body.deliverables, body.notes)
        .await?;
    Ok(Json(Envelope::new(submission)))
}
