//! HTTP middleware

pub mod auth;

pub use auth::{require_api_key, verify_callback_signature, SIGNATURE_HEADER};
