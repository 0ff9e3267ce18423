//! Postgres coordination store, selected with `MCP_STORE_DRIVER=postgres`.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{error, info};

use crate::error::{CoordError, Result};
use crate::models::{
    Claim, Contract, ContractFilter, ContractStatus, Event, FundingProof, Proposal,
    ProposalStatus, Submission, Task, TaskFilter,
};
use crate::store::CoordinationStore;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to coordination database");
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            error!("Failed to connect to database: {}", e);
            CoordError::Internal(format!("database connection: {}", e))
        })?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running coordination migrations");
        let migration_0001 = include_str!("../../migrations/0001_init.sql");
        sqlx::raw_sql(migration_0001)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Migration 0001 failed: {}", e);
                CoordError::DatabaseMigration(format!("Failed to run 0001_init.sql: {}", e))
            })?;
        info!("Coordination migrations completed");
        Ok(())
    }

    fn doc_row<T: serde::de::DeserializeOwned>(row: Option<sqlx::postgres::PgRow>) -> Result<Option<T>> {
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.get("doc");
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    fn doc_rows<T: serde::de::DeserializeOwned>(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: serde_json::Value = row.get("doc");
            out.push(serde_json::from_value(doc)?);
        }
        Ok(out)
    }

    fn status_str<S: serde::Serialize>(status: &S) -> Result<String> {
        let value = serde_json::to_value(status)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoordError::Internal("status did not serialize to string".to_string()))
    }
}

#[async_trait]
impl CoordinationStore for PostgresStore {
    async fn upsert_contract(&self, contract: &Contract, tasks: &[Task]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(CoordError::DatabaseQuery)?;

        sqlx::query(
            r#"
            INSERT INTO contracts (contract_id, status, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (contract_id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&contract.contract_id)
        .bind(Self::status_str(&contract.status)?)
        .bind(serde_json::to_value(contract)?)
        .bind(contract.created_at)
        .execute(&mut *tx)
        .await
        .map_err(CoordError::DatabaseQuery)?;

        for task in tasks {
            sqlx::query(
                r#"
                INSERT INTO tasks (task_id, contract_id, status, doc, updated_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (task_id)
                DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc, updated_at = NOW()
                "#,
            )
            .bind(&task.task_id)
            .bind(&task.contract_id)
            .bind(Self::status_str(&task.status)?)
            .bind(serde_json::to_value(task)?)
            .execute(&mut *tx)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        }

        tx.commit().await.map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn get_contract(&self, id: &str) -> Result<Option<Contract>> {
        let row = sqlx::query(r#"SELECT doc FROM contracts WHERE contract_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        let status = filter.status.map(|s| Self::status_str(&s)).transpose()?;
        let rows = sqlx::query(
            r#"
            SELECT doc FROM contracts
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(filter.limit.unwrap_or(100) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }

    async fn set_contract_status(&self, id: &str, status: ContractStatus) -> Result<()> {
        let status_str = Self::status_str(&status)?;
        let updated = sqlx::query(
            r#"
            UPDATE contracts
            SET status = $2,
                doc = jsonb_set(doc, '{status}', to_jsonb($2::text)),
                updated_at = NOW()
            WHERE contract_id = $1
            "#,
        )
        .bind(id)
        .bind(&status_str)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;

        if updated.rows_affected() == 0 {
            return Err(CoordError::not_found("contract", id));
        }
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query(r#"SELECT doc FROM tasks WHERE task_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let status = filter.status.map(|s| Self::status_str(&s)).transpose()?;
        let rows = sqlx::query(
            r#"
            SELECT doc FROM tasks
            WHERE ($1::text IS NULL OR contract_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR doc->'skills' ? $3)
            ORDER BY task_id, doc->>'title'
            LIMIT $4
            "#,
        )
        .bind(filter.contract_id.as_deref())
        .bind(status)
        .bind(filter.skill.as_deref())
        .bind(filter.limit.unwrap_or(500) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }

    async fn put_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, contract_id, status, doc, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (task_id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.contract_id)
        .bind(Self::status_str(&task.status)?)
        .bind(serde_json::to_value(task)?)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn get_claim(&self, id: &str) -> Result<Option<Claim>> {
        let row = sqlx::query(r#"SELECT doc FROM claims WHERE claim_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn put_claim(&self, claim: &Claim) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO claims (claim_id, task_id, status, doc, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (claim_id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc
            "#,
        )
        .bind(&claim.claim_id)
        .bind(&claim.task_id)
        .bind(Self::status_str(&claim.status)?)
        .bind(serde_json::to_value(claim)?)
        .bind(claim.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn claims_for_task(&self, task_id: &str) -> Result<Vec<Claim>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM claims
            WHERE task_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query(r#"SELECT doc FROM submissions WHERE submission_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submissions (submission_id, claim_id, status, doc, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (submission_id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc
            "#,
        )
        .bind(&submission.submission_id)
        .bind(&submission.claim_id)
        .bind(Self::status_str(&submission.status)?)
        .bind(serde_json::to_value(submission)?)
        .bind(submission.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn put_proposal(&self, proposal: &Proposal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO proposals (id, status, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&proposal.id)
        .bind(Self::status_str(&proposal.status)?)
        .bind(serde_json::to_value(proposal)?)
        .bind(proposal.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        let row = sqlx::query(r#"SELECT doc FROM proposals WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        limit: usize,
    ) -> Result<Vec<Proposal>> {
        let status = status.map(|s| Self::status_str(&s)).transpose()?;
        let rows = sqlx::query(
            r#"
            SELECT doc FROM proposals
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (event_type, entity_id, doc, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.entity_id)
        .bind(serde_json::to_value(event)?)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn recent_events(&self, entity_id: Option<&str>, limit: usize) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM events
            WHERE ($1::text IS NULL OR entity_id = $1)
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(entity_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }

    async fn put_proof(&self, proof: &FundingProof) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO funding_proofs (tx_id, status, doc, seen_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (tx_id)
            DO UPDATE SET status = EXCLUDED.status, doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&proof.tx_id)
        .bind(Self::status_str(&proof.confirmation_status)?)
        .bind(serde_json::to_value(proof)?)
        .bind(proof.seen_at)
        .execute(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Ok(())
    }

    async fn get_proof(&self, tx_id: &str) -> Result<Option<FundingProof>> {
        let row = sqlx::query(r#"SELECT doc FROM funding_proofs WHERE tx_id = $1"#)
            .bind(tx_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordError::DatabaseQuery)?;
        Self::doc_row(row)
    }

    async fn provisional_proofs(&self) -> Result<Vec<FundingProof>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM funding_proofs
            WHERE status = 'provisional'
            ORDER BY seen_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(CoordError::DatabaseQuery)?;
        Self::doc_rows(rows)
    }
}
