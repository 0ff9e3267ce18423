//! Coordination entities: proposals, contracts, tasks, claims, submissions,
//! events, and funding proofs.
//!
//! Entities reference each other by id only; stores own the objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stargate_ingest::models::Metadata;

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Pending,
    Approved,
    Published,
    Rejected,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Pending,
    Active,
    Claimed,
    Submitted,
    Approved,
    Rejected,
    Archived,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Available,
    Claimed,
    Submitted,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Expired,
    Fulfilled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
    Reviewed,
    Approved,
    Rejected,
    Reworked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Provisional,
    Confirmed,
    Stale,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description_md: String,
    pub visible_pixel_hash: String,
    pub budget_sats: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub metadata: Metadata,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Equal to the proposal's VPH once bound.
    pub contract_id: String,
    pub title: String,
    pub total_budget_sats: u64,
    pub goals_count: usize,
    pub available_tasks_count: usize,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub contract_id: String,
    pub goal_id: String,
    pub title: String,
    pub description: String,
    pub budget_sats: u64,
    #[serde(default)]
    pub skills: Vec<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<FundingProof>,
}

impl Task {
    /// Status as observed by callers: a claim expired at or before `now`
    /// reads back as available, never as stale claimed state.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TaskStatus {
        match (self.status, self.claim_expires_at) {
            (TaskStatus::Claimed, Some(expires)) if expires <= now => TaskStatus::Available,
            (status, _) => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub task_id: String,
    pub ai_identifier: String,
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Claim {
    /// Expiry boundary: a claim is expired once `now == expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ClaimStatus::Active && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub claim_id: String,
    #[serde(default)]
    pub deliverables: serde_json::Value,
    #[serde(default)]
    pub completion_proof: serde_json::Value,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One step of a Merkle inclusion path: the sibling hash and the side it
/// occupies in the concatenation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// Funding state anchored to a transaction, provisional until the Merkle
/// path verifies against a block header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingProof {
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_header_merkle_root: Option<String>,
    #[serde(default)]
    pub proof_path: Vec<ProofStep>,
    pub visible_pixel_hash: String,
    pub funded_amount_sats: u64,
    pub funding_address: String,
    pub confirmation_status: ConfirmationStatus,
    /// SegWit inputs pre-calculate a stable txid; legacy inputs need the
    /// script-hash fallback at confirmation time.
    #[serde(default)]
    pub legacy_inputs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_script_hash: Option<String>,
    pub seen_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl FundingProof {
    /// Provisional proof seeded at PSBT construction time.
    pub fn provisional(
        tx_id: impl Into<String>,
        visible_pixel_hash: impl Into<String>,
        funded_amount_sats: u64,
        funding_address: impl Into<String>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            block_height: None,
            block_header_merkle_root: None,
            proof_path: Vec::new(),
            visible_pixel_hash: visible_pixel_hash.into(),
            funded_amount_sats,
            funding_address: funding_address.into(),
            confirmation_status: ConfirmationStatus::Provisional,
            legacy_inputs: false,
            payout_script_hash: None,
            seen_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

/// Append-only audit event, also fanned out to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub entity_id: String,
    pub actor: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        actor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            actor: actor.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub status: Option<ContractStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub contract_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub skill: Option<String>,
    pub limit: Option<usize>,
}
