//! Merkle inclusion proof verification.
//!
//! Bitcoin convention: double SHA-256 over the concatenation of the two
//! child hashes, with hex ids presented big-endian but hashed little-endian.
//! The path is ordered leaf to root; each step names the sibling hash and
//! the side the sibling occupies.

use sha2::{Digest, Sha256};

use crate::error::{CoordError, Result};
use crate::models::{Direction, ProofStep};

fn double_sha256(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(Sha256::digest(bytes)).to_vec()
}

/// Hex (big-endian display) to internal little-endian bytes.
fn to_internal(hex_id: &str) -> Result<Vec<u8>> {
    let mut bytes = hex::decode(hex_id)
        .map_err(|e| CoordError::InvalidInput(format!("bad hash hex {:?}: {}", hex_id, e)))?;
    bytes.reverse();
    Ok(bytes)
}

fn to_display(mut internal: Vec<u8>) -> String {
    internal.reverse();
    hex::encode(internal)
}

/// Recompute the Merkle root implied by a txid and its inclusion path.
pub fn compute_root(tx_id: &str, path: &[ProofStep]) -> Result<String> {
    let mut current = to_internal(tx_id)?;

    for step in path {
        let sibling = to_internal(&step.hash)?;
        let mut concat = Vec::with_capacity(64);
        match step.direction {
            Direction::Left => {
                concat.extend_from_slice(&sibling);
                concat.extend_from_slice(&current);
            }
            Direction::Right => {
                concat.extend_from_slice(&current);
                concat.extend_from_slice(&sibling);
            }
        }
        current = double_sha256(&concat);
    }

    Ok(to_display(current))
}

/// Verify a path against the block header's Merkle root.
pub fn verify(tx_id: &str, path: &[ProofStep], header_root: &str) -> Result<()> {
    let computed = compute_root(tx_id, path)?;
    if computed.eq_ignore_ascii_case(header_root) {
        Ok(())
    } else {
        Err(CoordError::MerkleMismatch {
            tx_id: tx_id.to_string(),
            computed,
            expected: header_root.to_string(),
        })
    }
}

/// Derive a directed path from an Esplora-style proof (sibling hashes plus
/// the transaction's position in the block).
pub fn path_from_position(merkle: &[String], pos: u32) -> Vec<ProofStep> {
    merkle
        .iter()
        .enumerate()
        .map(|(level, hash)| ProofStep {
            hash: hash.clone(),
            direction: if (pos >> level) & 1 == 1 {
                Direction::Left
            } else {
                Direction::Right
            },
        })
        .collect()
}
