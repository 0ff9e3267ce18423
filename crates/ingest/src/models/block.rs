//! Block artifact models — the ingestion product of a single block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::ScanResult;

/// Reference to one inscription found in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionRef {
    pub tx_id: String,
    pub input_index: u32,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Relative path under the block directory, never escaping it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub size_bytes: u64,
    /// Inline payload for small text content; larger payloads are file-backed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// SHA-256 of the payload, set for file-backed content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// An image extracted from an inscription and persisted to the uploads tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub tx_id: String,
    pub input_index: u32,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Aggregate scan outcome for one block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StegoSummary {
    pub total_images: usize,
    pub stego_detected: bool,
    pub stego_count: usize,
    pub average_confidence: f64,
    pub stego_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Utc>>,
}

impl StegoSummary {
    /// Fold per-image scan results into the block-level summary.
    pub fn from_results(results: &[Option<ScanResult>], scanned_at: DateTime<Utc>) -> Self {
        let scans: Vec<&ScanResult> = results.iter().flatten().collect();
        let stego: Vec<&&ScanResult> = scans.iter().filter(|r| r.is_stego).collect();

        let average_confidence = if scans.is_empty() {
            0.0
        } else {
            scans.iter().map(|r| r.confidence).sum::<f64>() / scans.len() as f64
        };

        let mut stego_types: Vec<String> = stego
            .iter()
            .filter_map(|r| r.stego_type.clone())
            .collect();
        stego_types.sort();
        stego_types.dedup();

        Self {
            total_images: scans.len(),
            stego_detected: !stego.is_empty(),
            stego_count: stego.len(),
            average_confidence,
            stego_types,
            scanned_at: Some(scanned_at),
        }
    }
}

/// Derived smart-contract sighting inside a block: an inscription whose
/// embedded message parsed as a wish with a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSighting {
    pub tx_id: String,
    pub visible_pixel_hash: String,
    pub message_preview: String,
}

/// The complete ingestion product of one block.
///
/// `scan_results` is positionally aligned with `inscriptions`; trailing
/// entries may be missing (not scanned) but never interleaved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockArtifact {
    pub block_height: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    pub tx_count: usize,
    pub inscriptions: Vec<InscriptionRef>,
    pub images: Vec<ExtractedImage>,
    #[serde(default)]
    pub smart_contracts: Vec<ContractSighting>,
    pub scan_results: Vec<Option<ScanResult>>,
    pub steganography_summary: StegoSummary,
    /// False when ingestion aborted partway; the partial artifact is kept.
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl BlockArtifact {
    /// Alignment invariant: scans never outnumber inscriptions.
    pub fn validate(&self) -> bool {
        self.scan_results.len() <= self.inscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanResult;

    fn scan(is_stego: bool, confidence: f64, stego_type: Option<&str>) -> ScanResult {
        ScanResult {
            is_stego,
            stego_probability: if is_stego { 0.9 } else { 0.1 },
            confidence,
            prediction: if is_stego { "stego" } else { "clean" }.to_string(),
            stego_type: stego_type.map(str::to_string),
            extracted_message: None,
            extraction_error: None,
        }
    }

    #[test]
    fn test_summary_empty() {
        let s = StegoSummary::from_results(&[], Utc::now());
        assert_eq!(s.total_images, 0);
        assert!(!s.stego_detected);
        assert_eq!(s.average_confidence, 0.0);
    }

    #[test]
    fn test_summary_counts_and_types() {
        let results = vec![
            Some(scan(true, 0.9, Some("alpha"))),
            Some(scan(false, 0.7, None)),
            Some(scan(true, 0.8, Some("alpha"))),
            None,
        ];
        let s = StegoSummary::from_results(&results, Utc::now());
        assert_eq!(s.total_images, 3);
        assert!(s.stego_detected);
        assert_eq!(s.stego_count, 2);
        assert_eq!(s.stego_types, vec!["alpha".to_string()]);
        assert!((s.average_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_artifact_alignment_invariant() {
        let artifact = BlockArtifact {
            block_height: 840_000,
            block_hash: "00".repeat(32),
            timestamp: Utc::now(),
            tx_count: 2,
            inscriptions: vec![],
            images: vec![],
            smart_contracts: vec![],
            scan_results: vec![Some(scan(false, 0.5, None))],
            steganography_summary: StegoSummary::default(),
            success: true,
        };
        assert!(!artifact.validate());
    }

    #[test]
    fn test_artifact_serde_round_trip() {
        let artifact = BlockArtifact {
            block_height: 840_000,
            block_hash: "ab".repeat(32),
            timestamp: Utc::now(),
            tx_count: 10,
            inscriptions: vec![InscriptionRef {
                tx_id: "cd".repeat(32),
                input_index: 0,
                content_type: "text/plain".to_string(),
                file_name: None,
                file_path: None,
                size_bytes: 5,
                content: Some("hello".to_string()),
                content_hash: None,
            }],
            images: vec![],
            smart_contracts: vec![],
            scan_results: vec![None],
            steganography_summary: StegoSummary::default(),
            success: true,
        };
        let json = serde_json::to_string(&artifact).unwrap();
        let back: BlockArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_success_defaults_true_for_older_artifacts() {
        let json = serde_json::json!({
            "block_height": 1,
            "block_hash": "00",
            "timestamp": Utc::now(),
            "tx_count": 0,
            "inscriptions": [],
            "images": [],
            "scan_results": [],
            "steganography_summary": StegoSummary::default(),
        });
        let back: BlockArtifact = serde_json::from_value(json).unwrap();
        assert!(back.success);
    }
}
