//! Ingestion record — the "wish" as raw material.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::models::meta::{Metadata, MetadataExt};

/// Lifecycle status of an ingestion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Validated,
    Rejected,
    Confirmed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Confirmed => "confirmed",
        }
    }
}

/// A stored wish: cover image plus metadata, keyed by VPH once known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    /// Record id; equals the VPH once the embedded message is known.
    pub id: String,
    pub filename: String,
    /// Codec hint for the steganography scanner.
    pub method: String,
    pub message_length: usize,
    /// Cover image bytes, base64 in transit and in JSON persistence.
    #[serde(with = "base64_bytes")]
    pub image_bytes: Vec<u8>,
    #[serde(default)]
    pub metadata: Metadata,
    pub status: IngestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IngestionRecord {
    /// Build a record from ingress input, validating the image payload.
    pub fn new(
        id: impl Into<String>,
        filename: &str,
        method: &str,
        image_base64: &str,
        metadata: Metadata,
    ) -> Result<Self> {
        let image_bytes = base64::engine::general_purpose::STANDARD
            .decode(image_base64)
            .map_err(|e| IngestError::InvalidInput(format!("image_base64: {}", e)))?;
        if image_bytes.is_empty() {
            return Err(IngestError::InvalidInput(
                "image_base64 decoded to zero bytes".to_string(),
            ));
        }

        let message_length = metadata
            .embedded_message()
            .map(|m| m.len())
            .unwrap_or_default();

        Ok(Self {
            id: id.into(),
            filename: crate::paths::sanitize_filename(filename),
            method: method.to_string(),
            message_length,
            image_bytes,
            metadata,
            status: IngestionStatus::Pending,
            status_note: None,
            created_at: Utc::now(),
        })
    }

    /// The embedded message, from either metadata key.
    pub fn embedded_message(&self) -> Option<&str> {
        self.metadata.embedded_message()
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
