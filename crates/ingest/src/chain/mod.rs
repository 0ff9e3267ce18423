//! Chain access — Esplora-compatible REST client

pub mod client;

pub use client::{ChainClient, RetryConfig};

use serde::{Deserialize, Serialize};

/// Block header summary as returned by `/block/:hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeaderInfo {
    /// Block hash.
    pub id: String,
    pub height: u64,
    /// Unix timestamp of the block.
    pub timestamp: i64,
    pub tx_count: usize,
    pub merkle_root: String,
}

/// One transaction input with its witness stack (hex-encoded items).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub witness: Vec<String>,
    #[serde(default)]
    pub is_coinbase: bool,
}

/// One transaction output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// Confirmation status of a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
}

/// A transaction as returned by `/tx/:txid` and `/block/:hash/txs/:index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTx {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
    #[serde(default)]
    pub status: TxStatus,
}

/// Merkle inclusion proof as returned by `/tx/:txid/merkle-proof`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProofResponse {
    pub block_height: u64,
    /// Sibling hashes, leaf to root.
    pub merkle: Vec<String>,
    /// Index of the transaction within the block.
    pub pos: u32,
}
