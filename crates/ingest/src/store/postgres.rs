//! Postgres-backed stores.
//!
//! One JSONB document per row with identity/time columns broken out for
//! indexing.  Selected with `STARGATE_STORAGE=postgres`.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{error, info};

use crate::error::{IngestError, Result};
use crate::models::meta::MetadataExt;
use crate::models::{BlockArtifact, IngestionRecord, IngestionStatus, Metadata};
use crate::store::{BlockStore, IngestionStore};
use crate::vph::sha256_hex;

/// Shared connection pool with migration support.
#[derive(Clone)]
pub struct PgPoolHandle {
    pool: PgPool,
}

impl PgPoolHandle {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database");
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            error!("Failed to connect to database: {}", e);
            IngestError::DatabaseConnection(e.to_string())
        })?;
        info!("Database connection established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run embedded migrations in order.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running ingest migrations");
        let migration_0001 = include_str!("../../migrations/0001_init.sql");
        sqlx::raw_sql(migration_0001)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Migration 0001 failed: {}", e);
                IngestError::DatabaseMigration(format!("Failed to run 0001_init.sql: {}", e))
            })?;
        info!("Ingest migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(IngestError::DatabaseQuery)?;
        Ok(())
    }
}

/// Block artifact store on `block_scans`.
pub struct PgBlockStore {
    pool: PgPool,
}

impl PgBlockStore {
    pub fn new(handle: &PgPoolHandle) -> Self {
        Self {
            pool: handle.pool().clone(),
        }
    }
}

#[async_trait]
impl BlockStore for PgBlockStore {
    async fn put(&self, artifact: &BlockArtifact) -> Result<()> {
        let doc = serde_json::to_value(artifact)?;
        sqlx::query(
            r#"
            INSERT INTO block_scans (block_height, block_hash, doc, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (block_height)
            DO UPDATE SET
                block_hash = EXCLUDED.block_hash,
                doc = EXCLUDED.doc,
                updated_at = NOW()
            "#,
        )
        .bind(artifact.block_height as i64)
        .bind(&artifact.block_hash)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;
        Ok(())
    }

    async fn get(&self, height: u64) -> Result<Option<BlockArtifact>> {
        let row = sqlx::query(
            r#"
            SELECT doc FROM block_scans WHERE block_height = $1
            "#,
        )
        .bind(height as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        match row {
            Some(row) => {
                let doc: serde_json::Value = row.get("doc");
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn heights(&self, limit: usize) -> Result<Vec<u64>> {
        let rows = sqlx::query(
            r#"
            SELECT block_height FROM block_scans
            ORDER BY block_height DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<i64, _>("block_height") as u64)
            .collect())
    }
}

/// Ingestion record store on `ingestions`.
pub struct PgIngestionStore {
    pool: PgPool,
}

impl PgIngestionStore {
    pub fn new(handle: &PgPoolHandle) -> Self {
        Self {
            pool: handle.pool().clone(),
        }
    }

    fn dedupe_keys(record: &IngestionRecord) -> (String, String) {
        let message = record.embedded_message().unwrap_or_default();
        (
            sha256_hex(&record.image_bytes),
            sha256_hex(message.as_bytes()),
        )
    }
}

#[async_trait]
impl IngestionStore for PgIngestionStore {
    async fn create(&self, record: &IngestionRecord) -> Result<()> {
        let (image_sha, message_sha) = Self::dedupe_keys(record);
        let doc = serde_json::to_value(record)?;

        sqlx::query(
            r#"
            INSERT INTO ingestions (id, status, image_sha256, message_sha256, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(record.status.as_str())
        .bind(&image_sha)
        .bind(&message_sha)
        .bind(&doc)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<IngestionRecord>> {
        let row = sqlx::query(r#"SELECT doc FROM ingestions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(IngestError::DatabaseQuery)?;

        match row {
            Some(row) => {
                let doc: serde_json::Value = row.get("doc");
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_image_and_message(
        &self,
        image: &[u8],
        message: &str,
    ) -> Result<Option<IngestionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT doc FROM ingestions
            WHERE image_sha256 = $1 AND message_sha256 = $2
            LIMIT 1
            "#,
        )
        .bind(sha256_hex(image))
        .bind(sha256_hex(message.as_bytes()))
        .fetch_optional(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        match row {
            Some(row) => {
                let doc: serde_json::Value = row.get("doc");
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn update_metadata(&self, id: &str, patch: &Metadata) -> Result<()> {
        // Single-row read-modify-write inside one transaction so the merge
        // cannot interleave with a rekey of the same record.
        let mut tx = self.pool.begin().await.map_err(IngestError::DatabaseQuery)?;

        let row = sqlx::query(r#"SELECT doc FROM ingestions WHERE id = $1 FOR UPDATE"#)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(IngestError::DatabaseQuery)?
            .ok_or_else(|| IngestError::RecordNotFound(id.to_string()))?;

        let doc: serde_json::Value = row.get("doc");
        let mut record: IngestionRecord = serde_json::from_value(doc)?;
        for (k, v) in patch {
            record.metadata.insert(k.clone(), v.clone());
        }
        if let Some(message) = record.metadata.embedded_message() {
            record.message_length = message.len();
        }
        let (image_sha, message_sha) = Self::dedupe_keys(&record);

        sqlx::query(
            r#"
            UPDATE ingestions
            SET doc = $2, image_sha256 = $3, message_sha256 = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(serde_json::to_value(&record)?)
        .bind(&image_sha)
        .bind(&message_sha)
        .execute(&mut *tx)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        tx.commit().await.map_err(IngestError::DatabaseQuery)?;
        Ok(())
    }

    async fn update_id(&self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(IngestError::DatabaseQuery)?;

        let occupied = sqlx::query(r#"SELECT 1 AS one FROM ingestions WHERE id = $1"#)
            .bind(new)
            .fetch_optional(&mut *tx)
            .await
            .map_err(IngestError::DatabaseQuery)?;
        if occupied.is_some() {
            return Err(IngestError::DuplicateRecord(new.to_string()));
        }

        let updated = sqlx::query(
            r#"
            UPDATE ingestions
            SET id = $2,
                doc = jsonb_set(doc, '{id}', to_jsonb($2::text)),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(old)
        .bind(new)
        .execute(&mut *tx)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        if updated.rows_affected() == 0 {
            return Err(IngestError::RecordNotFound(old.to_string()));
        }

        tx.commit().await.map_err(IngestError::DatabaseQuery)?;
        Ok(())
    }

    async fn update_status_with_note(
        &self,
        id: &str,
        status: IngestionStatus,
        note: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE ingestions
            SET status = $2,
                doc = jsonb_set(
                    jsonb_set(doc, '{status}', to_jsonb($2::text)),
                    '{status_note}', to_jsonb($3::text)
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        if updated.rows_affected() == 0 {
            return Err(IngestError::RecordNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_recent(
        &self,
        status: Option<IngestionStatus>,
        limit: usize,
    ) -> Result<Vec<IngestionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM ingestions
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(IngestError::DatabaseQuery)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: serde_json::Value = row.get("doc");
            out.push(serde_json::from_value(doc)?);
        }
        Ok(out)
    }
}
