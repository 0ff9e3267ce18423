//! Task endpoints: listing, claims, proof updates

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use stargate_coordination::models::{FundingProof, Task, TaskFilter};
use stargate_coordination::CoordError;

use crate::error::{ApiError, Result};
use crate::models::{ClaimRequest, Envelope, TaskListParams};
use crate::routes::parse_status;
use crate::state::AppState;

/// List tasks with effective (expiry-adjusted) statuses.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TaskListParams>,
) -> Result<Json<Envelope<Vec<Task>>>> {
    debug!(?params, "Listing tasks");

    let status = params
        .status
        .as_deref()
        .map(parse_status::<stargate_coordination::models::TaskStatus>)
        .transpose()?;

    let tasks = state
        .coordination
        .list_tasks(&TaskFilter {
            contract_id: params.contract_id,
            status,
            skill: params.skill,
            limit: params.limit,
        })
        .await?;
    Ok(Json(Envelope::new(tasks)))
}

/// One task by id.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Task>>> {
    let task = state.coordination.get_task(&id).await?;
    Ok(Json(Envelope::new(task)))
}

/// Claim a task.  A conflicting live claim returns 409 carrying the active
/// claim id so the loser can observe the winner.
pub async fn claim_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> Result<Response> {
    if body.ai_identifier.trim().is_empty() {
        return Err(ApiError::BadRequest("ai_identifier is required".to_string()));
    }

    match state
        .coordination
        .claim_task(&task_id, &body.ai_identifier, body.estimated_completion)
        .await
    {
        Ok(claim) => Ok(Json(Envelope::new(claim)).into_response()),
        Err(CoordError::ClaimConflict {
            task_id,
            active_claim_id,
        }) => {
            let body = serde_json::json!({
                "success": false,
                "error": {
                    "code": "conflict",
                    "message": format!("task {} already claimed", task_id),
                    "active_claim_id": active_claim_id,
                }
            });
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace a task's embedded funding proof.
pub async fn update_proof(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(proof): Json<FundingProof>,
) -> Result<Json<Envelope<Task>>> {
    state.coordination.update_task_proof(&task_id, proof).await?;
    let task = state.coordination.get_task(&task_id).await?;
    Ok(Json(Envelope::new(task)))
}
