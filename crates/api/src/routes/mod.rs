//! API routes
//!
//! Coordination endpoints live under `/api/smart_contract/*`; the agent
//! tool surface under `/mcp/*` aliases the very same handler functions, so
//! a rename must touch both tables together.

pub mod content;
pub mod contracts;
pub mod events;
pub mod health;
pub mod ingress;
pub mod proposals;
pub mod submissions;
pub mod tasks;

use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::require_api_key;
use crate::state::AppState;

/// Parse a status string through its serde representation.
pub(crate) fn parse_status<T: serde::de::DeserializeOwned>(
    s: &str,
) -> Result<T, ApiError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| ApiError::BadRequest(format!("unknown status {:?}", s)))
}

/// The coordination route table, mounted at both surfaces.
fn coordination_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contracts", get(contracts::list_contracts))
        .route("/contracts/:id", get(contracts::get_contract))
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/:id", get(tasks::get_task))
        .route("/tasks/:id/claim", post(tasks::claim_task))
        .route("/tasks/:id/proof", put(tasks::update_proof))
        .route("/claims/:id/submit", post(submissions::submit))
        .route("/submissions/:id", get(submissions::get_submission))
        .route("/submissions/:id/review", post(submissions::review))
        .route("/submissions/:id/rework", post(submissions::rework))
        .route(
            "/proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route("/proposals/:id", get(proposals::get_proposal))
        .route("/proposals/:id/approve", post(proposals::approve_proposal))
        .route("/proposals/:id/publish", post(proposals::publish_proposal))
        .route("/proposals/:id/reject", post(proposals::reject_proposal))
        .route(
            "/proposals/:id/republish",
            post(proposals::republish_proposal),
        )
        .route("/events", get(events::event_stream))
        .route("/events/recent", get(events::recent_events))
}

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let authed = Router::new()
        .nest("/api/smart_contract", coordination_routes())
        .nest("/mcp", coordination_routes())
        .route(
            "/api/inscriptions",
            post(ingress::ingest_inscription).get(ingress::list_ingestions),
        )
        .route("/api/scan_callback", post(ingress::scan_callback))
        .layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        // Health and content stay public.
        .route("/health", get(health::health_check))
        .route("/content/:txid", get(content::get_raw))
        .route("/content/:txid/manifest", get(content::get_manifest))
        .merge(authed)
        .with_state(state)
}
