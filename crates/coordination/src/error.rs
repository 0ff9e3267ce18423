//! Error types for the coordination store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Conflict: task {task_id} already claimed by {active_claim_id}")]
    ClaimConflict {
        task_id: String,
        active_claim_id: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Merkle root mismatch for tx {tx_id}: computed {computed}, header {expected}")]
    MerkleMismatch {
        tx_id: String,
        computed: String,
        expected: String,
    },

    #[error("Funding provider error: {0}")]
    Provider(String),

    #[error("Ingest error: {0}")]
    Ingest(#[from] stargate_ingest::IngestError),

    #[error("Database query failed: {0}")]
    DatabaseQuery(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    DatabaseMigration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(_) => true,
            Self::Ingest(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::NotFound { .. } => Level::DEBUG,
            Self::ClaimConflict { .. } | Self::Conflict(_) => Level::INFO,
            Self::InvalidTransition { .. } | Self::InvalidInput(_) => Level::WARN,
            Self::MerkleMismatch { .. } => Level::WARN,
            Self::Provider(_) => Level::WARN,
            _ => Level::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_conflict_carries_active_claim_id() {
        let err = CoordError::ClaimConflict {
            task_id: "task-1".to_string(),
            active_claim_id: "claim-9".to_string(),
        };
        assert!(err.to_string().contains("claim-9"));
        assert_eq!(err.log_level(), tracing::Level::INFO);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = CoordError::InvalidTransition {
            from: "approved".to_string(),
            to: "claimed".to_string(),
        };
        assert!(err.to_string().contains("approved -> claimed"));
    }

    #[test]
    fn test_provider_errors_are_retryable() {
        assert!(CoordError::Provider("timeout".to_string()).is_retryable());
        assert!(!CoordError::InvalidInput("bad".to_string()).is_retryable());
    }
}
