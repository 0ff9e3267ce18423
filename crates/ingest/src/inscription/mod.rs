//! Inscription parsing and MIME normalization

pub mod mime;
pub mod parser;

pub use parser::{extract_inscriptions, parse_witness_script, ParsedInscription};
