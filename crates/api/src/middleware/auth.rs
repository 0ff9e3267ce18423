//! API key and callback signature verification.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Signature header for scan callbacks.
pub const SIGNATURE_HEADER: &str = "X-Starlight-Signature";

/// Constant-time equality via digest comparison; input lengths leak nothing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let da = Sha256::digest(a);
    let db = Sha256::digest(b);
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extract the presented API key from either accepted header form.
fn presented_key(req: &Request<Body>) -> Option<&str> {
    if let Some(key) = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Require the configured API key; a missing configuration disables the
/// check entirely.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.auth.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    match presented_key(&req) {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(req).await)
        }
        Some(_) => Err(ApiError::Unauthorized("invalid API key".to_string())),
        None => Err(ApiError::Unauthorized("missing API key".to_string())),
    }
}

/// Verify an HMAC-SHA256 signature over a raw callback body.
pub fn verify_callback_signature(
    secret: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::Internal("callback secret unusable".to_string()))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    let presented = hex::decode(signature_hex.trim())
        .map_err(|_| ApiError::Unauthorized("malformed signature".to_string()))?;

    if constant_time_eq(&expected, &presented) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("signature mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"ingestion_id":"abc"}"#;
        let sig = sign("shared-secret", body);
        assert!(verify_callback_signature("shared-secret", body, &sig).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign("other-secret", body);
        let err = verify_callback_signature("shared-secret", body, &sig).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign("shared-secret", b"original");
        let err = verify_callback_signature("shared-secret", b"tampered", &sig).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let err =
            verify_callback_signature("shared-secret", b"body", "not-hex!").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
