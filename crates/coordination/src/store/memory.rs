//! In-memory coordination store, the default driver.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{CoordError, Result};
use crate::models::{
    Claim, Contract, ContractFilter, ContractStatus, Event, FundingProof, Proposal,
    ProposalStatus, Submission, Task, TaskFilter,
};
use crate::store::CoordinationStore;

#[derive(Default)]
struct Inner {
    contracts: BTreeMap<String, Contract>,
    tasks: BTreeMap<String, Task>,
    claims: HashMap<String, Claim>,
    submissions: HashMap<String, Submission>,
    proposals: BTreeMap<String, Proposal>,
    events: Vec<Event>,
    proofs: HashMap<String, FundingProof>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn upsert_contract(&self, contract: &Contract, tasks: &[Task]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .contracts
            .insert(contract.contract_id.clone(), contract.clone());
        for task in tasks {
            inner.tasks.insert(task.task_id.clone(), task.clone());
        }
        Ok(())
    }

    async fn get_contract(&self, id: &str) -> Result<Option<Contract>> {
        Ok(self.inner.read().await.contracts.get(id).cloned())
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Contract> = inner
            .contracts
            .values()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn set_contract_status(&self, id: &str, status: ContractStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let contract = inner
            .contracts
            .get_mut(id)
            .ok_or_else(|| CoordError::not_found("contract", id))?;
        contract.status = status;
        contract.updated_at = Utc::now();
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| {
                filter
                    .contract_id
                    .as_deref()
                    .map_or(true, |c| t.contract_id == c)
                    && filter.status.map_or(true, |s| t.status == s)
                    && filter
                        .skill
                        .as_deref()
                        .map_or(true, |skill| t.skills.iter().any(|s| s == skill))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.task_id.cmp(&b.task_id).then(a.title.cmp(&b.title)));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn put_task(&self, task: &Task) -> Result<()> {
        self.inner
            .write()
            .await
            .tasks
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn get_claim(&self, id: &str) -> Result<Option<Claim>> {
        Ok(self.inner.read().await.claims.get(id).cloned())
    }

    async fn put_claim(&self, claim: &Claim) -> Result<()> {
        self.inner
            .write()
            .await
            .claims
            .insert(claim.claim_id.clone(), claim.clone());
        Ok(())
    }

    async fn claims_for_task(&self, task_id: &str) -> Result<Vec<Claim>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Claim> = inner
            .claims
            .values()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        Ok(self.inner.read().await.submissions.get(id).cloned())
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        self.inner
            .write()
            .await
            .submissions
            .insert(submission.submission_id.clone(), submission.clone());
        Ok(())
    }

    async fn put_proposal(&self, proposal: &Proposal) -> Result<()> {
        self.inner
            .write()
            .await
            .proposals
            .insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        Ok(self.inner.read().await.proposals.get(id).cloned())
    }

    async fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        limit: usize,
    ) -> Result<Vec<Proposal>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Proposal> = inner
            .proposals
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        self.inner.write().await.events.push(event.clone());
        Ok(())
    }

    async fn recent_events(&self, entity_id: Option<&str>, limit: usize) -> Result<Vec<Event>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| entity_id.map_or(true, |id| e.entity_id == id))
            .cloned()
            .collect();
        out.reverse();
        out.truncate(limit);
        Ok(out)
    }

    async fn put_proof(&self, proof: &FundingProof) -> Result<()> {
        self.inner
            .write()
            .await
            .proofs
            .insert(proof.tx_id.clone(), proof.clone());
        Ok(())
    }

    async fn get_proof(&self, tx_id: &str) -> Result<Option<FundingProof>> {
        Ok(self.inner.read().await.proofs.get(tx_id).cloned())
    }

    async fn provisional_proofs(&self) -> Result<Vec<FundingProof>> {
        let inner = self.inner.read().await;
        Ok(inner
            .proofs
            .values()
            .filter(|p| {
                p.confirmation_status == crate::models::ConfirmationStatus::Provisional
            })
            .cloned()
            .collect())
    }
}
