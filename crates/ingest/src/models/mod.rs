//! Data models for the ingestion crate

pub mod block;
pub mod ingestion;
pub mod meta;

pub use block::{BlockArtifact, ContractSighting, ExtractedImage, InscriptionRef, StegoSummary};
pub use ingestion::{IngestionRecord, IngestionStatus};
pub use meta::{Metadata, MetadataExt, MetaValue};
