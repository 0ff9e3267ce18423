//! Stargate API Server
//!
//! HTTP surface over the coordination core: smart-contract endpoints with
//! their `/mcp/*` tool aliases, the live event stream, inscription ingress,
//! and the content endpoint.

pub mod content_index;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use content_index::ContentIndex;
pub use error::{ApiError, Result};
pub use server::{Server, ServerConfig};
pub use state::{AppState, AuthConfig};
