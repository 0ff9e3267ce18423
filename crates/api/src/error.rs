//! Error types for the API
//!
//! Every handler error renders as the stable envelope
//! `{"success":false,"error":{"code","message"}}` with a matching HTTP
//! status; stack traces never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use stargate_coordination::CoordError;
use stargate_ingest::IngestError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable error code plus HTTP status for the envelope.
    fn code_and_status(&self) -> (&'static str, StatusCode, String) {
        match self {
            Self::BadRequest(msg) => ("invalid_input", StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => ("unauthorized", StatusCode::UNAUTHORIZED, msg.clone()),
            Self::NotFound(msg) => ("not_found", StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) => ("conflict", StatusCode::CONFLICT, msg.clone()),
            Self::Upstream(msg) => ("upstream", StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Coordination(e) => coordination_code(e),
            Self::Ingest(e) => ingest_code(e),
            Self::Internal(_) => (
                "internal",
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

fn coordination_code(e: &CoordError) -> (&'static str, StatusCode, String) {
    match e {
        CoordError::NotFound { .. } => ("not_found", StatusCode::NOT_FOUND, e.to_string()),
        CoordError::ClaimConflict { .. } | CoordError::Conflict(_) => {
            ("conflict", StatusCode::CONFLICT, e.to_string())
        }
        CoordError::InvalidTransition { .. } | CoordError::InvalidInput(_) => {
            ("invalid_input", StatusCode::BAD_REQUEST, e.to_string())
        }
        CoordError::MerkleMismatch { .. } => {
            ("upstream", StatusCode::BAD_GATEWAY, e.to_string())
        }
        CoordError::Provider(_) => ("upstream", StatusCode::BAD_GATEWAY, e.to_string()),
        CoordError::Ingest(inner) => ingest_code(inner),
        _ => (
            "internal",
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        ),
    }
}

fn ingest_code(e: &IngestError) -> (&'static str, StatusCode, String) {
    match e {
        IngestError::BlockNotFound(_)
        | IngestError::TxNotFound(_)
        | IngestError::RecordNotFound(_) => ("not_found", StatusCode::NOT_FOUND, e.to_string()),
        IngestError::DuplicateRecord(_) => ("conflict", StatusCode::CONFLICT, e.to_string()),
        IngestError::InvalidPath { .. } | IngestError::InvalidInput(_) => {
            ("invalid_input", StatusCode::BAD_REQUEST, e.to_string())
        }
        IngestError::ChainApi { .. }
        | IngestError::NetworkTimeout { .. }
        | IngestError::NetworkConnection(_)
        | IngestError::HttpRequest { .. }
        | IngestError::CircuitOpen
        | IngestError::Scanner(_)
        | IngestError::Cas(_) => ("upstream", StatusCode::BAD_GATEWAY, e.to_string()),
        _ => (
            "internal",
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status, message) = self.code_and_status();

        match self.log_level() {
            tracing::Level::ERROR => tracing::error!("API error: {}", self),
            tracing::Level::WARN => tracing::warn!("API error: {}", self),
            _ => tracing::debug!("API error: {}", self),
        }

        let body = serde_json::json!({
            "success": false,
            "error": { "code": code, "message": message }
        });
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    fn log_level(&self) -> tracing::Level {
        match self {
            Self::Internal(_) => tracing::Level::ERROR,
            Self::Coordination(e) => e.log_level(),
            Self::Ingest(e) => e.log_level(),
            Self::Upstream(_) => tracing::Level::WARN,
            _ => tracing::Level::DEBUG,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_conflict_maps_to_409() {
        let err = ApiError::Coordination(CoordError::ClaimConflict {
            task_id: "t".to_string(),
            active_claim_id: "c".to_string(),
        });
        let (code, status, _) = err.code_and_status();
        assert_eq!(code, "conflict");
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_transition_maps_to_400() {
        let err = ApiError::Coordination(CoordError::InvalidTransition {
            from: "available".to_string(),
            to: "approved".to_string(),
        });
        let (code, status, _) = err.code_and_status();
        assert_eq!(code, "invalid_input");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_path_rejection_maps_to_400() {
        let err = ApiError::Ingest(IngestError::InvalidPath {
            name: "../etc".to_string(),
            reason: "escape".to_string(),
        });
        let (_, status, _) = err.code_and_status();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = ApiError::Internal("lock poisoned at store.rs:42".to_string());
        let (_, _, message) = err.code_and_status();
        assert_eq!(message, "internal server error");
    }
}
