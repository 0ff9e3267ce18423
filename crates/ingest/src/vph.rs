//! Visible pixel hash — the canonical join key across the system.
//!
//! A VPH is the SHA-256 digest of the cover image bytes concatenated with the
//! embedded message, carried as lowercase hex.  The full 64-character digest
//! is the one canonical wire form; the 16-character short form exists only
//! for human display.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IngestError, Result};

/// Length in hex characters of the canonical digest.
pub const VPH_HEX_LEN: usize = 64;

/// Full visible-pixel-hash digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vph(String);

impl Vph {
    /// Compute the VPH of a cover image and its embedded message.
    pub fn compute(image_bytes: &[u8], message: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(image_bytes);
        hasher.update(message.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a canonical VPH, rejecting short forms and non-hex input.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != VPH_HEX_LEN {
            return Err(IngestError::InvalidInput(format!(
                "visible_pixel_hash must be {} hex chars, got {}",
                VPH_HEX_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IngestError::InvalidInput(
                "visible_pixel_hash must be hex".to_string(),
            ));
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex chars, display only.
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl std::fmt::Display for Vph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of arbitrary bytes, lowercase hex.  Used for content integrity
/// hashes and for deriving contract ids from stego image bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
