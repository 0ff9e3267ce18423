//! Coordination persistence.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Claim, Contract, ContractFilter, ContractStatus, Event, FundingProof, Proposal,
    ProposalStatus, Submission, Task, TaskFilter,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Authoritative store for proposals, contracts, tasks, claims, submissions,
/// events, and funding proofs.  The service layer serializes mutations per
/// task/proposal; implementations only need single-row atomicity.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    // Contracts
    async fn upsert_contract(&self, contract: &Contract, tasks: &[Task]) -> Result<()>;
    async fn get_contract(&self, id: &str) -> Result<Option<Contract>>;
    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>>;
    async fn set_contract_status(&self, id: &str, status: ContractStatus) -> Result<()>;

    // Tasks
    async fn get_task(&self, id: &str) -> Result<Option<Task>>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    async fn put_task(&self, task: &Task) -> Result<()>;

    // Claims
    async fn get_claim(&self, id: &str) -> Result<Option<Claim>>;
    async fn put_claim(&self, claim: &Claim) -> Result<()>;
    async fn claims_for_task(&self, task_id: &str) -> Result<Vec<Claim>>;

    // Submissions
    async fn get_submission(&self, id: &str) -> Result<Option<Submission>>;
    async fn put_submission(&self, submission: &Submission) -> Result<()>;

    // Proposals
    async fn put_proposal(&self, proposal: &Proposal) -> Result<()>;
    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>>;
    async fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        limit: usize,
    ) -> Result<Vec<Proposal>>;

    // Events (append-only)
    async fn append_event(&self, event: &Event) -> Result<()>;
    async fn recent_events(&self, entity_id: Option<&str>, limit: usize) -> Result<Vec<Event>>;

    // Funding proofs
    async fn put_proof(&self, proof: &FundingProof) -> Result<()>;
    async fn get_proof(&self, tx_id: &str) -> Result<Option<FundingProof>>;
    async fn provisional_proofs(&self) -> Result<Vec<FundingProof>>;
}
