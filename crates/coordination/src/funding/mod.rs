//! Funding & Merkle proof refresh service.
//!
//! A single worker sweeps provisional proofs against a chain provider.  A
//! proof confirms only when the recomputed Merkle root matches the block
//! header and enough confirmations have accrued; a mismatch leaves the proof
//! provisional and records an audit event.

pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CoordError, Result};
use crate::merkle;
use crate::models::{ConfirmationStatus, Event, FundingProof, TaskFilter};
use crate::service::CoordinationService;

pub use provider::{EsploraProvider, FundingProvider, ProviderProof};

#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfig {
    /// Sweep cadence in seconds (env: `MCP_FUNDING_SYNC_INTERVAL_SEC`).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Provisional proofs older than this are marked stale, never deleted.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,

    /// Confirmations required before a Merkle-valid proof confirms
    /// (env: `MCP_FUNDING_CONFIRMATIONS`).
    #[serde(default = "default_confirmations")]
    pub confirmations_required: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_age_hours() -> i64 {
    168
}

fn default_confirmations() -> u64 {
    6
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_age_hours: default_max_age_hours(),
            confirmations_required: default_confirmations(),
        }
    }
}

pub struct FundingService {
    coordination: Arc<CoordinationService>,
    provider: Arc<dyn FundingProvider>,
    config: FundingConfig,
}

impl FundingService {
    pub fn new(
        coordination: Arc<CoordinationService>,
        provider: Arc<dyn FundingProvider>,
        config: FundingConfig,
    ) -> Self {
        Self {
            coordination,
            provider,
            config,
        }
    }

    /// Seed a provisional proof.  SegWit inputs make the unsigned txid
    /// stable, so this is safe at PSBT construction time.
    pub async fn seed_provisional(&self, proof: FundingProof) -> Result<()> {
        self.coordination.store().put_proof(&proof).await?;
        self.coordination
            .emit(Event::new(
                "proof_provisional",
                &proof.tx_id,
                "funding",
                format!("{} sats to {}", proof.funded_amount_sats, proof.funding_address),
            ))
            .await
    }

    /// One sweep over every provisional proof.  Returns confirmed count.
    pub async fn refresh_once(&self) -> Result<usize> {
        let pending = self.coordination.store().provisional_proofs().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        debug!(pending = pending.len(), "Refreshing provisional proofs");

        let tip = self.provider.tip_height().await?;
        let mut confirmed = 0;

        // Proofs refresh one at a time; per-task updates serialize through
        // the coordination service's task locks.
        for proof in pending {
            match self.refresh_proof(&proof, tip).await {
                Ok(true) => confirmed += 1,
                Ok(false) => {}
                Err(e) => warn!(tx_id = %proof.tx_id, "Proof refresh failed: {}", e),
            }
        }

        if confirmed > 0 {
            info!(confirmed, "Funding proofs confirmed");
        }
        Ok(confirmed)
    }

    async fn refresh_proof(&self, proof: &FundingProof, tip: u64) -> Result<bool> {
        let found = match self.provider.lookup_tx(&proof.tx_id).await? {
            Some(found) => Some(found),
            None if proof.legacy_inputs => match proof.payout_script_hash.as_deref() {
                Some(script_hash) => {
                    self.provider.lookup_by_script_hash(script_hash).await?
                }
                None => None,
            },
            None => None,
        };

        let Some(found) = found else {
            // Not on chain yet; age out to stale past the configured window.
            let age = Utc::now() - proof.seen_at;
            if age > chrono::Duration::hours(self.config.max_age_hours) {
                let mut stale = proof.clone();
                stale.confirmation_status = ConfirmationStatus::Stale;
                self.coordination.store().put_proof(&stale).await?;
                self.coordination
                    .emit(Event::new(
                        "proof_stale",
                        &proof.tx_id,
                        "funding",
                        format!("no confirmation after {}h", self.config.max_age_hours),
                    ))
                    .await?;
            }
            return Ok(false);
        };

        // Never trust the indexer: recompute the root from the path.
        if let Err(e) = merkle::verify(
            &found.tx_id,
            &found.proof_path,
            &found.block_header_merkle_root,
        ) {
            self.coordination
                .emit(Event::new(
                    "proof_invalid",
                    &proof.tx_id,
                    "funding",
                    e.to_string(),
                ))
                .await?;
            return Ok(false);
        }

        let confirmations = tip.saturating_sub(found.block_height) + 1;
        if confirmations < self.config.confirmations_required {
            debug!(
                tx_id = %proof.tx_id,
                confirmations,
                required = self.config.confirmations_required,
                "Merkle-valid but under-confirmed"
            );
            return Ok(false);
        }

        // Re-read under the single worker: confirm at most once.
        let current = self
            .coordination
            .store()
            .get_proof(&proof.tx_id)
            .await?
            .ok_or_else(|| CoordError::not_found("proof", &proof.tx_id))?;
        if current.confirmation_status != ConfirmationStatus::Provisional {
            return Ok(false);
        }

        let mut updated = current;
        updated.block_height = Some(found.block_height);
        updated.block_header_merkle_root = Some(found.block_header_merkle_root);
        updated.proof_path = found.proof_path;
        updated.confirmation_status = ConfirmationStatus::Confirmed;
        updated.confirmed_at = Some(Utc::now());

        self.coordination.store().put_proof(&updated).await?;
        self.update_linked_tasks(&updated).await?;
        self.coordination
            .emit(Event::new(
                "proof_confirmed",
                &updated.tx_id,
                "funding",
                format!("confirmed at height {}", found.block_height),
            ))
            .await?;

        Ok(true)
    }

    /// Push the confirmed proof into every task that carries its txid.
    async fn update_linked_tasks(&self, proof: &FundingProof) -> Result<()> {
        let tasks = self
            .coordination
            .store()
            .list_tasks(&TaskFilter {
                contract_id: Some(proof.visible_pixel_hash.clone()),
                ..Default::default()
            })
            .await?;

        for task in tasks {
            let linked = task
                .merkle_proof
                .as_ref()
                .map(|p| p.tx_id == proof.tx_id)
                .unwrap_or(false);
            if linked {
                self.coordination
                    .update_task_proof(&task.task_id, proof.clone())
                    .await?;
            }
        }
        Ok(())
    }

    /// Run the refresh loop at the configured cadence.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval = self.config.interval_secs,
            "Starting funding proof refresh loop"
        );
        loop {
            if let Err(e) = self.refresh_once().await {
                warn!("Funding refresh sweep failed: {}", e);
            }
            tokio::time::sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }
}
