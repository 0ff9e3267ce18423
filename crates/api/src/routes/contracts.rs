//! Contract endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use stargate_coordination::models::{Contract, ContractFilter};

use crate::error::Result;
use crate::models::{ContractListParams, Envelope};
use crate::routes::parse_status;
use crate::state::AppState;

/// List contracts, optionally filtered by status.
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ContractListParams>,
) -> Result<Json<Envelope<Vec<Contract>>>> {
    debug!(?params, "Listing contracts");

    let status = params
        .status
        .as_deref()
        .map(parse_status::<stargate_coordination::models::ContractStatus>)
        .transpose()?;

    let contracts = state
        .coordination
        .list_contracts(&ContractFilter {
            status,
            limit: params.limit,
        })
        .await?;
    Ok(Json(Envelope::new(contracts)))
}

/// One contract by id.
pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Contract>>> {
    let contract = state.coordination.get_contract(&id).await?;
    Ok(Json(Envelope::new(contract)))
}
