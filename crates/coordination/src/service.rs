//! Coordination service: the one mutation path over the store.
//!
//! Serializes per-task mutations through task-level locks, validates every
//! status transition against the fixed table, and appends exactly one event
//! per state change, published to the bus after the mutation commits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stargate_ingest::models::MetadataExt;
use stargate_ingest::vph::Vph;

use crate::error::{CoordError, Result};
use crate::events::EventBus;
use crate::markdown;
use crate::models::{
    Claim, ClaimStatus, Contract, ContractFilter, ContractStatus, Event, FundingProof,
    Proposal, ProposalStatus, Submission, SubmissionStatus, Task, TaskFilter, TaskStatus,
};
use crate::store::CoordinationStore;
use crate::transitions::{self, TransitionContext};

/// Default claim TTL in hours (`MCP_DEFAULT_CLAIM_TTL_HOURS`).
pub const DEFAULT_CLAIM_TTL_HOURS: i64 = 72;

pub struct CoordinationService {
    store: Arc<dyn CoordinationStore>,
    bus: EventBus,
    claim_ttl: chrono::Duration,
    task_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CoordinationService {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_claim_ttl(store, chrono::Duration::hours(DEFAULT_CLAIM_TTL_HOURS))
    }

    pub fn with_claim_ttl(store: Arc<dyn CoordinationStore>, claim_ttl: chrono::Duration) -> Self {
        Self {
            store,
            bus: EventBus::new(),
            claim_ttl,
            task_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Append an event and fan it out, strictly after the state mutation.
    pub(crate) async fn emit(&self, event: Event) -> Result<()> {
        self.store.append_event(&event).await?;
        self.bus.publish(&event);
        Ok(())
    }

    async fn task_lock(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.task_locks.lock().await;
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        self.store.list_contracts(filter).await
    }

    pub async fn get_contract(&self, id: &str) -> Result<Contract> {
        self.store
            .get_contract(id)
            .await?
            .ok_or_else(|| CoordError::not_found("contract", id))
    }

    /// Tasks with their effective status: stale claimed state is never
    /// exposed to callers.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let now = Utc::now();
        let mut tasks = self.store.list_tasks(&TaskFilter {
            status: None,
            ..filter.clone()
        })
        .await?;

        for task in &mut tasks {
            let effective = task.effective_status(now);
            if effective != task.status {
                task.status = effective;
                task.claimed_by = None;
                task.claim_expires_at = None;
            }
        }

        if let Some(status) = filter.status {
            tasks.retain(|t| t.status == status);
        }
        Ok(tasks)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let mut task = self
            .store
            .get_task(id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", id))?;
        let effective = task.effective_status(Utc::now());
        if effective != task.status {
            task.status = effective;
            task.claimed_by = None;
            task.claim_expires_at = None;
        }
        Ok(task)
    }

    pub async fn get_submission(&self, id: &str) -> Result<Submission> {
        self.store
            .get_submission(id)
            .await?
            .ok_or_else(|| CoordError::not_found("submission", id))
    }

    pub async fn get_proposal(&self, id: &str) -> Result<Proposal> {
        self.store
            .get_proposal(id)
            .await?
            .ok_or_else(|| CoordError::not_found("proposal", id))
    }

    pub async fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        limit: usize,
    ) -> Result<Vec<Proposal>> {
        self.store.list_proposals(status, limit).await
    }

    pub async fn recent_events(
        &self,
        entity_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        self.store.recent_events(entity_id, limit).await
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Claim a task.  Linearized per task; idempotent for the same agent
    /// while the claim is live; conflicting agents observe the winner.
    pub async fn claim_task(
        &self,
        task_id: &str,
        ai_identifier: &str,
        estimated_completion: Option<String>,
    ) -> Result<Claim> {
        let lock = self.task_lock(task_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", task_id))?;

        // A live claim either belongs to this agent (idempotent) or wins.
        if let Some(active) = self.active_claim(task_id, now).await? {
            if active.ai_identifier == ai_identifier {
                debug!(task_id, ai_identifier, "Repeat claim inside TTL, returning existing");
                return Ok(active);
            }
            return Err(CoordError::ClaimConflict {
                task_id: task_id.to_string(),
                active_claim_id: active.claim_id,
            });
        }

        // Release a stale claim before re-claiming.
        if task.status == TaskStatus::Claimed {
            self.release_expired(&mut task, now).await?;
        }

        if task.status != TaskStatus::Available {
            return Err(CoordError::InvalidTransition {
                from: task.status.to_string(),
                to: TaskStatus::Claimed.to_string(),
            });
        }

        let claim = Claim {
            claim_id: format!("claim-{}", Uuid::new_v4()),
            task_id: task_id.to_string(),
            ai_identifier: ai_identifier.to_string(),
            status: ClaimStatus::Active,
            estimated_completion,
            expires_at: now + self.claim_ttl,
            created_at: now,
        };

        transitions::validate(
            task.status,
            TaskStatus::Claimed,
            &TransitionContext::WithClaim { claim: &claim, now },
        )?;

        task.status = TaskStatus::Claimed;
        task.claimed_by = Some(ai_identifier.to_string());
        task.claim_expires_at = Some(claim.expires_at);

        self.store.put_claim(&claim).await?;
        self.store.put_task(&task).await?;
        self.emit(Event::new(
            "task_claim",
            task_id,
            ai_identifier,
            format!("claimed until {}", claim.expires_at.to_rfc3339()),
        ))
        .await?;

        Ok(claim)
    }

    async fn active_claim(
        &self,
        task_id: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<Claim>> {
        let claims = self.store.claims_for_task(task_id).await?;
        Ok(claims.into_iter().find(|c| c.is_active(now)))
    }

    async fn release_expired(
        &self,
        task: &mut Task,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let claims = self.store.claims_for_task(&task.task_id).await?;
        for mut claim in claims {
            if claim.status == ClaimStatus::Active && claim.is_expired(now) {
                transitions::validate(
                    TaskStatus::Claimed,
                    TaskStatus::Available,
                    &TransitionContext::ClaimExpired { claim: &claim, now },
                )?;
                claim.status = ClaimStatus::Expired;
                self.store.put_claim(&claim).await?;
                self.emit(Event::new(
                    "claim_expired",
                    &task.task_id,
                    &claim.ai_identifier,
                    "claim expired, task released",
                ))
                .await?;
            }
        }
        task.status = TaskStatus::Available;
        task.claimed_by = None;
        task.claim_expires_at = None;
        self.store.put_task(task).await?;
        Ok(())
    }

    /// Update a task's embedded funding proof.
    pub async fn update_task_proof(&self, task_id: &str, proof: FundingProof) -> Result<()> {
        let lock = self.task_lock(task_id).await;
        let _guard = lock.lock().await;

        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", task_id))?;
        task.merkle_proof = Some(proof);
        self.store.put_task(&task).await
    }

    // -----------------------------------------------------------------------
    // Submissions and review
    // -----------------------------------------------------------------------

    /// Submit work against a claim; creates one submission and moves the
    /// task to `submitted`.
    pub async fn submit(
        &self,
        claim_id: &str,
        deliverables: serde_json::Value,
        completion_proof: serde_json::Value,
    ) -> Result<Submission> {
        let claim = self
            .store
            .get_claim(claim_id)
            .await?
            .ok_or_else(|| CoordError::not_found("claim", claim_id))?;

        let lock = self.task_lock(&claim.task_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut task = self
            .store
            .get_task(&claim.task_id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", &claim.task_id))?;

        transitions::validate(
            task.status,
            TaskStatus::Submitted,
            &TransitionContext::WithClaim { claim: &claim, now },
        )?;

        let submission = Submission {
            submission_id: format!("sub-{}", Uuid::new_v4()),
            claim_id: claim_id.to_string(),
            deliverables,
            completion_proof,
            status: SubmissionStatus::PendingReview,
            review_notes: None,
            created_at: now,
        };

        task.status = TaskStatus::Submitted;
        self.store.put_submission(&submission).await?;
        self.store.put_task(&task).await?;
        self.emit(Event::new(
            "task_submit",
            &claim.task_id,
            &claim.ai_identifier,
            format!("submission {}", submission.submission_id),
        ))
        .await?;

        Ok(submission)
    }

    /// Record a review verdict: `review` annotates, `approve` and `reject`
    /// settle the task.
    pub async fn review(
        &self,
        submission_id: &str,
        action: ReviewAction,
        notes: Option<String>,
    ) -> Result<Submission> {
        let mut submission = self.get_submission(submission_id).await?;
        let claim = self
            .store
            .get_claim(&submission.claim_id)
            .await?
            .ok_or_else(|| CoordError::not_found("claim", &submission.claim_id))?;

        let lock = self.task_lock(&claim.task_id).await;
        let _guard = lock.lock().await;

        if !matches!(
            submission.status,
            SubmissionStatus::PendingReview | SubmissionStatus::Reviewed
        ) {
            return Err(CoordError::Conflict(format!(
                "submission {} is not awaiting review",
                submission_id
            )));
        }

        let mut task = self
            .store
            .get_task(&claim.task_id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", &claim.task_id))?;

        match action {
            ReviewAction::Review => {
                submission.status = SubmissionStatus::Reviewed;
                submission.review_notes = notes;
                self.store.put_submission(&submission).await?;
                self.emit(Event::new(
                    "submission_review",
                    &claim.task_id,
                    "reviewer",
                    format!("submission {} reviewed", submission_id),
                ))
                .await?;
            }
            ReviewAction::Approve => {
                transitions::validate(
                    task.status,
                    TaskStatus::Approved,
                    &TransitionContext::Review,
                )?;
                submission.status = SubmissionStatus::Approved;
                submission.review_notes = notes;
                task.status = TaskStatus::Approved;

                let mut fulfilled = claim.clone();
                fulfilled.status = ClaimStatus::Fulfilled;

                self.store.put_submission(&submission).await?;
                self.store.put_task(&task).await?;
                self.store.put_claim(&fulfilled).await?;
                self.emit(Event::new(
                    "submission_approve",
                    &claim.task_id,
                    "reviewer",
                    format!("submission {} approved", submission_id),
                ))
                .await?;
            }
            ReviewAction::Reject => {
                transitions::validate(
                    task.status,
                    TaskStatus::Rejected,
                    &TransitionContext::Review,
                )?;
                submission.status = SubmissionStatus::Rejected;
                submission.review_notes = notes;
                task.status = TaskStatus::Rejected;

                self.store.put_submission(&submission).await?;
                self.store.put_task(&task).await?;
                self.emit(Event::new(
                    "submission_reject",
                    &claim.task_id,
                    "reviewer",
                    format!("submission {} rejected", submission_id),
                ))
                .await?;
            }
        }

        Ok(submission)
    }

    /// Rework a rejected submission: status returns to `pending_review` and
    /// the task re-enters `submitted`.
    pub async fn rework(
        &self,
        submission_id: &str,
        deliverables: Option<serde_json::Value>,
        notes: Option<String>,
    ) -> Result<Submission> {
        let mut submission = self.get_submission(submission_id).await?;
        let claim = self
            .store
            .get_claim(&submission.claim_id)
            .await?
            .ok_or_else(|| CoordError::not_found("claim", &submission.claim_id))?;

        let lock = self.task_lock(&claim.task_id).await;
        let _guard = lock.lock().await;

        if submission.status != SubmissionStatus::Rejected {
            return Err(CoordError::Conflict(format!(
                "submission {} is not rejected, cannot rework",
                submission_id
            )));
        }

        let mut task = self
            .store
            .get_task(&claim.task_id)
            .await?
            .ok_or_else(|| CoordError::not_found("task", &claim.task_id))?;

        transitions::validate(task.status, TaskStatus::Submitted, &TransitionContext::Rework)?;

        if let Some(deliverables) = deliverables {
            submission.deliverables = deliverables;
        }
        submission.status = SubmissionStatus::PendingReview;
        submission.review_notes = notes;
        task.status = TaskStatus::Submitted;

        self.store.put_submission(&submission).await?;
        self.store.put_task(&task).await?;
        self.emit(Event::new(
            "submission_rework",
            &claim.task_id,
            &claim.ai_identifier,
            format!("submission {} reworked", submission_id),
        ))
        .await?;

        Ok(submission)
    }

    // -----------------------------------------------------------------------
    // Proposals
    // -----------------------------------------------------------------------

    pub async fn create_proposal(&self, proposal: Proposal) -> Result<Proposal> {
        if self.store.get_proposal(&proposal.id).await?.is_some() {
            return Err(CoordError::Conflict(format!(
                "proposal {} already exists",
                proposal.id
            )));
        }
        self.store.put_proposal(&proposal).await?;
        self.emit(Event::new(
            "proposal_create",
            &proposal.id,
            "system",
            &proposal.title,
        ))
        .await?;
        Ok(proposal)
    }

    /// Approve a proposal: bind its contract id, derive tasks, and upsert
    /// the contract atomically.
    pub async fn approve_proposal(&self, id: &str) -> Result<Contract> {
        let mut proposal = self.get_proposal(id).await?;

        if !matches!(
            proposal.status,
            ProposalStatus::Draft | ProposalStatus::Pending
        ) {
            return Err(CoordError::Conflict(format!(
                "proposal {} is not awaiting approval",
                id
            )));
        }

        // Contract id: explicit metadata wins, the VPH is the canonical path.
        let contract_id = proposal
            .metadata
            .str_value(stargate_ingest::models::meta::keys::CONTRACT_ID)
            .map(str::to_string)
            .unwrap_or_else(|| proposal.visible_pixel_hash.clone());
        Vph::parse(&contract_id).map_err(|_| {
            CoordError::InvalidInput(format!(
                "contract id {:?} is not a canonical digest",
                contract_id
            ))
        })?;

        let mut tasks = if proposal.tasks.is_empty() {
            derive_tasks_from_message(&proposal, &contract_id)
        } else {
            proposal
                .tasks
                .iter()
                .cloned()
                .map(|mut t| {
                    t.contract_id = contract_id.clone();
                    t
                })
                .collect()
        };
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id).then(a.title.cmp(&b.title)));

        let now = Utc::now();
        let contract = Contract {
            contract_id: contract_id.clone(),
            title: proposal.title.clone(),
            total_budget_sats: proposal.budget_sats,
            goals_count: 1,
            available_tasks_count: tasks.len(),
            status: ContractStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.store.upsert_contract(&contract, &tasks).await?;

        proposal.status = ProposalStatus::Approved;
        proposal.tasks = tasks;
        self.store.put_proposal(&proposal).await?;

        self.emit(Event::new(
            "contract_upsert",
            &contract_id,
            "system",
            format!("{} tasks", contract.available_tasks_count),
        ))
        .await?;
        self.emit(Event::new("publish", &contract_id, "system", &proposal.title))
            .await?;

        info!(proposal = id, contract = %contract_id, "Proposal approved");
        Ok(contract)
    }

    pub async fn publish_proposal(&self, id: &str) -> Result<Proposal> {
        let mut proposal = self.get_proposal(id).await?;
        if proposal.status != ProposalStatus::Approved {
            return Err(CoordError::Conflict(format!(
                "proposal {} must be approved before publishing",
                id
            )));
        }
        proposal.status = ProposalStatus::Published;
        self.store.put_proposal(&proposal).await?;
        self.emit(Event::new("proposal_publish", id, "system", &proposal.title))
            .await?;
        Ok(proposal)
    }

    pub async fn reject_proposal(&self, id: &str) -> Result<Proposal> {
        let mut proposal = self.get_proposal(id).await?;
        proposal.status = ProposalStatus::Rejected;
        self.store.put_proposal(&proposal).await?;
        self.emit(Event::new("proposal_reject", id, "system", &proposal.title))
            .await?;
        Ok(proposal)
    }

    // -----------------------------------------------------------------------
    // Expiry sweeper
    // -----------------------------------------------------------------------

    /// Release every task whose claim has expired.  Returns released count.
    pub async fn sweep_expired_claims(&self) -> Result<usize> {
        let now = Utc::now();
        let claimed = self
            .store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Claimed),
                ..Default::default()
            })
            .await?;

        let mut released = 0;
        for task in claimed {
            if task.effective_status(now) != TaskStatus::Available {
                continue;
            }
            let lock = self.task_lock(&task.task_id).await;
            let _guard = lock.lock().await;

            // Re-read under the lock; a racing claim may have refreshed it.
            let Some(mut current) = self.store.get_task(&task.task_id).await? else {
                continue;
            };
            if current.status == TaskStatus::Claimed
                && current.effective_status(now) == TaskStatus::Available
            {
                self.release_expired(&mut current, now).await?;
                released += 1;
            }
        }

        if released > 0 {
            info!(released, "Expired claims swept");
        }
        Ok(released)
    }

    /// Run the sweeper at a fixed cadence.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration) {
        info!("Starting claim expiry sweeper");
        loop {
            if let Err(e) = self.sweep_expired_claims().await {
                warn!("Claim sweep failed: {}", e);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Review verdict for `CoordinationService::review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Review,
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "review" => Ok(Self::Review),
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(CoordError::InvalidInput(format!(
                "unknown review action {:?}",
                other
            ))),
        }
    }
}

/// Derive tasks from the proposal's embedded markdown message.
fn derive_tasks_from_message(proposal: &Proposal, contract_id: &str) -> Vec<Task> {
    let Some(message) = proposal.metadata.embedded_message() else {
        return Vec::new();
    };

    let plan = markdown::parse_plan(message);
    let total = if plan.total_budget_sats > 0 {
        plan.total_budget_sats
    } else {
        proposal.budget_sats
    };
    let count = plan.tasks.len().max(1) as u64;
    let per_task = total / count;

    plan.tasks
        .into_iter()
        .enumerate()
        .map(|(i, parsed)| Task {
            task_id: format!("{}-task-{}", contract_id, i + 1),
            contract_id: contract_id.to_string(),
            goal_id: format!("{}-goal-1", contract_id),
            title: parsed.title,
            description: parsed.description,
            budget_sats: per_task,
            skills: parsed.skills,
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        })
        .collect()
}

/// Development fixtures (`MCP_SEED_FIXTURES=true`): one demo contract with
/// three open tasks.
pub async fn seed_fixtures(service: &CoordinationService) -> Result<()> {
    let vph = Vph::compute(b"fixture-cover", "Fixture wish");
    let now = Utc::now();

    let contract = Contract {
        contract_id: vph.to_string(),
        title: "Demo: index the night sky".to_string(),
        total_budget_sats: 30_000,
        goals_count: 1,
        available_tasks_count: 3,
        status: ContractStatus::Active,
        created_at: now,
        updated_at: now,
    };
    let tasks: Vec<Task> = (1..=3)
        .map(|i| Task {
            task_id: format!("{}-task-{}", vph, i),
            contract_id: vph.to_string(),
            goal_id: format!("{}-goal-1", vph),
            title: format!("Fixture task {}", i),
            description: "Seeded for local development".to_string(),
            budget_sats: 10_000,
            skills: vec!["rust".to_string()],
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        })
        .collect();

    service.store.upsert_contract(&contract, &tasks).await?;
    debug!("Seeded development fixtures");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use stargate_ingest::models::Metadata;

    async fn service_with_task() -> (Arc<CoordinationService>, String) {
        let service = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        let vph = Vph::compute(b"img", "Task: build\nBudget: 1000");
        let now = Utc::now();
        let contract = Contract {
            contract_id: vph.to_string(),
            title: "Test".to_string(),
            total_budget_sats: 1000,
            goals_count: 1,
            available_tasks_count: 1,
            status: ContractStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let task = Task {
            task_id: format!("{}-task-1", vph),
            contract_id: vph.to_string(),
            goal_id: format!("{}-goal-1", vph),
            title: "build".to_string(),
            description: String::new(),
            budget_sats: 1000,
            skills: vec![],
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        };
        service
            .store()
            .upsert_contract(&contract, &[task.clone()])
            .await
            .unwrap();
        (service, task.task_id)
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_claim_then_conflict_for_other_agent() {
        let (service, task_id) = service_with_task().await;

        let claim = service
            .claim_task(&task_id, "agent-a", None)
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Active);

        let err = service
            .claim_task(&task_id, "agent-b", None)
            .await
            .unwrap_err();
        match err {
            CoordError::ClaimConflict {
                active_claim_id, ..
            } => assert_eq!(active_claim_id, claim.claim_id),
            other => panic!("Expected ClaimConflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_claim_idempotent_for_same_agent() {
        let (service, task_id) = service_with_task().await;

        let first = service.claim_task(&task_id, "agent-a", None).await.unwrap();
        let second = service.claim_task(&task_id, "agent-a", None).await.unwrap();
        assert_eq!(first.claim_id, second.claim_id);

        // Exactly one active claim exists.
        let claims = service.store().claims_for_task(&task_id).await.unwrap();
        let active: Vec<_> = claims
            .iter()
            .filter(|c| c.is_active(Utc::now()))
            .collect();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_races_produce_one_winner() {
        let (service, task_id) = service_with_task().await;

        let a = {
            let service = service.clone();
            let task_id = task_id.clone();
            tokio::spawn(async move { service.claim_task(&task_id, "agent-a", None).await })
        };
        let b = {
            let service = service.clone();
            let task_id = task_id.clone();
            tokio::spawn(async move { service.claim_task(&task_id, "agent-b", None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CoordError::ClaimConflict { .. })))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn test_expired_claim_allows_reclaim() {
        let store = Arc::new(MemoryStore::new());
        let service =
            Arc::new(CoordinationService::with_claim_ttl(store, chrono::Duration::zero()));
        let vph = Vph::compute(b"img", "m");
        let task = Task {
            task_id: "t1".to_string(),
            contract_id: vph.to_string(),
            goal_id: "g1".to_string(),
            title: "t".to_string(),
            description: String::new(),
            budget_sats: 0,
            skills: vec![],
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        };
        service.store().put_task(&task).await.unwrap();

        // TTL of zero: the claim expires at creation time.
        service.claim_task("t1", "agent-a", None).await.unwrap();
        let reclaim = service.claim_task("t1", "agent-b", None).await.unwrap();
        assert_eq!(reclaim.ai_identifier, "agent-b");
    }

    #[tokio::test]
    async fn test_list_tasks_exposes_effective_status() {
        let store = Arc::new(MemoryStore::new());
        let service =
            Arc::new(CoordinationService::with_claim_ttl(store, chrono::Duration::zero()));
        let task = Task {
            task_id: "t1".to_string(),
            contract_id: "c1".to_string(),
            goal_id: "g1".to_string(),
            title: "t".to_string(),
            description: String::new(),
            budget_sats: 0,
            skills: vec![],
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        };
        service.store().put_task(&task).await.unwrap();
        service.claim_task("t1", "agent-a", None).await.unwrap();

        // Claim is instantly expired; listings must show available.
        let tasks = service
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Available),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].claimed_by.is_none());
    }

    #[tokio::test]
    async fn test_sweeper_releases_expired_claims() {
        let store = Arc::new(MemoryStore::new());
        let service =
            Arc::new(CoordinationService::with_claim_ttl(store, chrono::Duration::zero()));
        let task = Task {
            task_id: "t1".to_string(),
            contract_id: "c1".to_string(),
            goal_id: "g1".to_string(),
            title: "t".to_string(),
            description: String::new(),
            budget_sats: 0,
            skills: vec![],
            status: TaskStatus::Available,
            claimed_by: None,
            claim_expires_at: None,
            merkle_proof: None,
        };
        service.store().put_task(&task).await.unwrap();
        service.claim_task("t1", "agent-a", None).await.unwrap();

        let released = service.sweep_expired_claims().await.unwrap();
        assert_eq!(released, 1);

        let stored = service.store().get_task("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Available);
    }

    // -----------------------------------------------------------------------
    // Submission lifecycle (spec scenario: reject -> rework -> approve)
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_full_review_cycle() {
        let (service, task_id) = service_with_task().await;

        let claim = service.claim_task(&task_id, "agent-a", None).await.unwrap();
        let submission = service
            .submit(
                &claim.claim_id,
                serde_json::json!({"repo": "https://example.com/pr/1"}),
                serde_json::json!({"hash": "abc"}),
            )
            .await
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::PendingReview);
        assert_eq!(
            service.get_task(&task_id).await.unwrap().status,
            TaskStatus::Submitted
        );

        // Reject, rework, resubmit, approve.
        let rejected = service
            .review(
                &submission.submission_id,
                ReviewAction::Reject,
                Some("missing tests".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(
            service.get_task(&task_id).await.unwrap().status,
            TaskStatus::Rejected
        );

        let reworked = service
            .rework(
                &submission.submission_id,
                Some(serde_json::json!({"repo": "https://example.com/pr/2"})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(reworked.status, SubmissionStatus::PendingReview);
        assert_eq!(
            service.get_task(&task_id).await.unwrap().status,
            TaskStatus::Submitted
        );

        let approved = service
            .review(&submission.submission_id, ReviewAction::Approve, None)
            .await
            .unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);
        assert_eq!(
            service.get_task(&task_id).await.unwrap().status,
            TaskStatus::Approved
        );

        // Claim settles as fulfilled.
        let settled = service
            .store()
            .get_claim(&claim.claim_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.status, ClaimStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_submit_without_claim_edge_fails() {
        let (service, task_id) = service_with_task().await;
        let claim = service.claim_task(&task_id, "agent-a", None).await.unwrap();
        service
            .submit(&claim.claim_id, serde_json::json!({}), serde_json::json!({}))
            .await
            .unwrap();

        // Second submit on the same claim: task is already submitted.
        let err = service
            .submit(&claim.claim_id, serde_json::json!({}), serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_rework_requires_rejected_submission() {
        let (service, task_id) = service_with_task().await;
        let claim = service.claim_task(&task_id, "agent-a", None).await.unwrap();
        let submission = service
            .submit(&claim.claim_id, serde_json::json!({}), serde_json::json!({}))
            .await
            .unwrap();

        let err = service
            .rework(&submission.submission_id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordError::Conflict(_)));
    }

    // -----------------------------------------------------------------------
    // Proposal approval
    // -----------------------------------------------------------------------

    fn proposal_from_wish(message: &str) -> Proposal {
        let vph = Vph::compute(b"cover", message);
        let mut metadata = Metadata::new();
        metadata.insert(
            stargate_ingest::models::meta::keys::EMBEDDED_MESSAGE.into(),
            message.into(),
        );
        Proposal {
            id: format!("prop-{}", vph.short()),
            title: "Wish".to_string(),
            description_md: message.to_string(),
            visible_pixel_hash: vph.to_string(),
            budget_sats: 1000,
            tasks: vec![],
            metadata,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_approve_binds_contract_id_to_vph() {
        let service = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        let proposal = proposal_from_wish("Budget: 900\n1. a\n2. b\n3. c");
        let vph = proposal.visible_pixel_hash.clone();
        service.create_proposal(proposal.clone()).await.unwrap();

        let contract = service.approve_proposal(&proposal.id).await.unwrap();
        assert_eq!(contract.contract_id, vph);
        assert_eq!(contract.available_tasks_count, 3);

        let tasks = service
            .list_tasks(&TaskFilter {
                contract_id: Some(vph.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.budget_sats == 300));
        // Deterministic ordering by task id.
        assert!(tasks.windows(2).all(|w| w[0].task_id <= w[1].task_id));
    }

    #[tokio::test]
    async fn test_approve_twice_is_idempotent_by_contract_id() {
        let service = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        let proposal = proposal_from_wish("Task: once\nBudget: 100");
        service.create_proposal(proposal.clone()).await.unwrap();
        service.approve_proposal(&proposal.id).await.unwrap();

        // Second approval is rejected, the upsert stays keyed by one id.
        let err = service.approve_proposal(&proposal.id).await.unwrap_err();
        assert!(matches!(err, CoordError::Conflict(_)));

        let contracts = service
            .list_contracts(&ContractFilter::default())
            .await
            .unwrap();
        assert_eq!(contracts.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_requires_approved() {
        let service = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        let proposal = proposal_from_wish("Task: t\nBudget: 10");
        service.create_proposal(proposal.clone()).await.unwrap();

        let err = service.publish_proposal(&proposal.id).await.unwrap_err();
        assert!(matches!(err, CoordError::Conflict(_)));

        service.approve_proposal(&proposal.id).await.unwrap();
        let published = service.publish_proposal(&proposal.id).await.unwrap();
        assert_eq!(published.status, ProposalStatus::Published);
    }

    #[tokio::test]
    async fn test_events_follow_state_changes() {
        let (service, task_id) = service_with_task().await;
        let mut sub = service.bus().subscribe();

        service.claim_task(&task_id, "agent-a", None).await.unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, "task_claim");
        assert_eq!(event.entity_id, task_id);

        // The persisted event exists too.
        let events = service.recent_events(Some(&task_id), 10).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_fixtures() {
        let service = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        seed_fixtures(&service).await.unwrap();
        let contracts = service
            .list_contracts(&ContractFilter::default())
            .await
            .unwrap();
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].available_tasks_count, 3);
    }
}
