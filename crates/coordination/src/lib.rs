//! Stargate Coordination
//!
//! Authoritative state for the wish → proposal → contract → task lifecycle:
//! claims, submissions, reviews, funding proofs, and the stego republish
//! path, with live event fanout.

pub mod config;
pub mod error;
pub mod events;
pub mod funding;
pub mod markdown;
pub mod merkle;
pub mod models;
pub mod republish;
pub mod service;
pub mod store;
pub mod transitions;

pub use config::{CoordConfig, StoreDriver};
pub use error::{CoordError, Result};
pub use events::EventBus;
pub use service::{CoordinationService, ReviewAction};
