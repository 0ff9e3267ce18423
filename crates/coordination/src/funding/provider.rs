//! Chain providers for funding proof refresh.

use async_trait::async_trait;

use stargate_ingest::chain::ChainClient;
use stargate_ingest::IngestError;

use crate::error::{CoordError, Result};
use crate::merkle;
use crate::models::ProofStep;

/// What a provider knows about a confirmed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProof {
    pub tx_id: String,
    pub block_height: u64,
    pub block_header_merkle_root: String,
    pub proof_path: Vec<ProofStep>,
}

#[async_trait]
pub trait FundingProvider: Send + Sync {
    /// Inclusion proof for a transaction, `None` while unconfirmed.
    async fn lookup_tx(&self, tx_id: &str) -> Result<Option<ProviderProof>>;

    /// Legacy-input fallback: most recent confirmed transaction paying the
    /// given script hash.
    async fn lookup_by_script_hash(&self, script_hash: &str) -> Result<Option<ProviderProof>>;

    /// Current chain tip height, for confirmation counting.
    async fn tip_height(&self) -> Result<u64>;
}

/// Esplora-backed provider (`MCP_FUNDING_PROVIDER=esplora`).
pub struct EsploraProvider {
    chain: ChainClient,
}

impl EsploraProvider {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            chain: ChainClient::new(api_base),
        }
    }

    async fn proof_for(&self, tx_id: &str) -> Result<Option<ProviderProof>> {
        let raw = match self.chain.merkle_proof(tx_id).await {
            Ok(raw) => raw,
            Err(IngestError::TxNotFound(_)) => return Ok(None),
            Err(e) => return Err(CoordError::Provider(e.to_string())),
        };

        let block_hash = self
            .chain
            .block_hash_at(raw.block_height)
            .await
            .map_err(|e| CoordError::Provider(e.to_string()))?;
        let header = self
            .chain
            .block_header(&block_hash)
            .await
            .map_err(|e| CoordError::Provider(e.to_string()))?;

        Ok(Some(ProviderProof {
            tx_id: tx_id.to_string(),
            block_height: raw.block_height,
            block_header_merkle_root: header.merkle_root,
            proof_path: merkle::path_from_position(&raw.merkle, raw.pos),
        }))
    }
}

#[async_trait]
impl FundingProvider for EsploraProvider {
    async fn lookup_tx(&self, tx_id: &str) -> Result<Option<ProviderProof>> {
        self.proof_for(tx_id).await
    }

    async fn lookup_by_script_hash(&self, script_hash: &str) -> Result<Option<ProviderProof>> {
        let txs = self
            .chain
            .scripthash_txs(script_hash)
            .await
            .map_err(|e| CoordError::Provider(e.to_string()))?;

        for tx in txs {
            if tx.status.confirmed {
                return self.proof_for(&tx.txid).await;
            }
        }
        Ok(None)
    }

    async fn tip_height(&self) -> Result<u64> {
        self.chain
            .tip_height()
            .await
            .map_err(|e| CoordError::Provider(e.to_string()))
    }
}
