//! Stego republish service.
//!
//! On proposal approval, the canonical payload is re-embedded into a fresh
//! cover image and both artifacts are pinned to the CAS.  The wire shapes
//! (payload envelope, manifest YAML, announcement JSON) are stable formats;
//! key names and ordering must not drift.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use stargate_ingest::cas::Cas;
use stargate_ingest::models::meta::{keys, MetadataExt};
use stargate_ingest::models::{MetaValue, Metadata};
use stargate_ingest::scanner::ScannerHandle;
use stargate_ingest::store::IngestionStore;
use stargate_ingest::vph::sha256_hex;

use crate::error::{CoordError, Result};
use crate::models::{ContractStatus, Event, Proposal};
use crate::service::CoordinationService;

/// Current payload envelope schema.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RepublishConfig {
    /// Steganography method passed to the scanner (env: `STARGATE_STEGO_METHOD`).
    #[serde(default = "default_method")]
    pub method: String,

    /// Scanner embed timeout in seconds (env: `STARGATE_STEGO_INSCRIBE_TIMEOUT_SEC`).
    #[serde(default = "default_inscribe_timeout_secs")]
    pub inscribe_timeout_secs: u64,

    /// Ingestion-record poll window in seconds (env: `STARGATE_STEGO_INGEST_TIMEOUT_SEC`).
    #[serde(default = "default_ingest_timeout_secs")]
    pub ingest_timeout_secs: u64,

    /// Poll cadence in seconds (env: `STARGATE_STEGO_INGEST_POLL_SEC`).
    #[serde(default = "default_ingest_poll_secs")]
    pub ingest_poll_secs: u64,

    /// Task list cap in the payload envelope.
    #[serde(default = "default_payload_max_tasks")]
    pub payload_max_tasks: usize,

    /// Issuer identity carried in the manifest and announcement.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Whether to publish the announcement envelope.
    #[serde(default)]
    pub announce_enabled: bool,
}

fn default_method() -> String {
    "alpha".to_string()
}

fn default_inscribe_timeout_secs() -> u64 {
    60
}

fn default_ingest_timeout_secs() -> u64 {
    30
}

fn default_ingest_poll_secs() -> u64 {
    2
}

fn default_payload_max_tasks() -> usize {
    2000
}

fn default_issuer() -> String {
    "stargate".to_string()
}

impl Default for RepublishConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            inscribe_timeout_secs: default_inscribe_timeout_secs(),
            ingest_timeout_secs: default_ingest_timeout_secs(),
            ingest_poll_secs: default_ingest_poll_secs(),
            payload_max_tasks: default_payload_max_tasks(),
            issuer: default_issuer(),
            announce_enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PayloadProposal {
    id: String,
    title: String,
    description_md: String,
    budget_sats: u64,
    visible_pixel_hash: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct PayloadTask {
    task_id: String,
    title: String,
    description: String,
    budget_sats: u64,
    skills: Vec<String>,
    contractor_wallet: String,
}

#[derive(Debug, Serialize)]
struct PayloadMetaEntry {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct PayloadEnvelope {
    schema_version: u32,
    proposal: PayloadProposal,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<PayloadTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    metadata: Vec<PayloadMetaEntry>,
}

/// Manifest fields serialize in declaration order; the YAML key order is
/// part of the format.
#[derive(Debug, Serialize)]
struct Manifest {
    schema_version: u32,
    proposal_id: String,
    visible_pixel_hash: String,
    payload_cid: String,
    created_at: String,
    issuer: String,
}

#[derive(Debug, Serialize)]
struct Announcement {
    #[serde(rename = "type")]
    kind: &'static str,
    stego_cid: String,
    expected_hash: String,
    proposal_id: String,
    visible_pixel_hash: String,
    payload_cid: String,
    issuer: String,
    timestamp: String,
}

/// Outcome of a successful republish.
#[derive(Debug, Clone, PartialEq)]
pub struct RepublishOutcome {
    pub payload_cid: String,
    pub stego_cid: String,
    pub contract_id: String,
    pub request_id: String,
    /// False when the metadata already carried the artifacts.
    pub performed: bool,
}

/// Announcement publisher.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, envelope: &serde_json::Value) -> Result<()>;
}

/// HTTP topic publisher.
pub struct HttpAnnouncer {
    topic_url: String,
    http: reqwest::Client,
}

impl HttpAnnouncer {
    pub fn new(topic_url: impl Into<String>) -> Self {
        Self {
            topic_url: topic_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Announcer for HttpAnnouncer {
    async fn announce(&self, envelope: &serde_json::Value) -> Result<()> {
        let resp = self
            .http
            .post(&self.topic_url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| CoordError::Provider(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoordError::Provider(format!(
                "announce failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// No-op announcer for disabled announcement.
pub struct NoopAnnouncer;

#[async_trait]
impl Announcer for NoopAnnouncer {
    async fn announce(&self, _envelope: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct StegoRepublisher {
    coordination: Arc<CoordinationService>,
    ingestions: Arc<dyn IngestionStore>,
    scanner: ScannerHandle,
    cas: Arc<dyn Cas>,
    announcer: Arc<dyn Announcer>,
    config: RepublishConfig,
}

impl StegoRepublisher {
    pub fn new(
        coordination: Arc<CoordinationService>,
        ingestions: Arc<dyn IngestionStore>,
        scanner: ScannerHandle,
        cas: Arc<dyn Cas>,
        announcer: Arc<dyn Announcer>,
        config: RepublishConfig,
    ) -> Self {
        Self {
            coordination,
            ingestions,
            scanner,
            cas,
            announcer,
            config,
        }
    }

    /// Re-embed an approved proposal's payload and pin the artifacts.
    /// Idempotent: a proposal that already carries the stego metadata is a
    /// no-op; a retried call after failure re-enters from the start.
    pub async fn republish(&self, proposal_id: &str) -> Result<RepublishOutcome> {
        let proposal = self.coordination.get_proposal(proposal_id).await?;

        if let (Some(contract_id), Some(stego_cid)) = (
            proposal.metadata.str_value(keys::STEGO_CONTRACT_ID),
            proposal.metadata.str_value(keys::STEGO_IMAGE_CID),
        ) {
            debug!(proposal_id, "Republish already completed, no-op");
            return Ok(RepublishOutcome {
                payload_cid: proposal
                    .metadata
                    .str_value(keys::PAYLOAD_CID)
                    .unwrap_or_default()
                    .to_string(),
                stego_cid: stego_cid.to_string(),
                contract_id: contract_id.to_string(),
                request_id: proposal
                    .metadata
                    .str_value(keys::REQUEST_ID)
                    .unwrap_or_default()
                    .to_string(),
                performed: false,
            });
        }

        // The originating wish supplies the cover image.
        let ingestion_id = proposal
            .metadata
            .str_value(keys::INGESTION_ID)
            .ok_or_else(|| {
                CoordError::InvalidInput(format!(
                    "proposal {} has no ingestion_id metadata",
                    proposal_id
                ))
            })?;
        let record = self
            .ingestions
            .get(ingestion_id)
            .await
            .map_err(CoordError::Ingest)?
            .ok_or_else(|| CoordError::not_found("ingestion", ingestion_id))?;

        let record_vph = record.metadata.visible_pixel_hash().ok_or_else(|| {
            CoordError::InvalidInput(format!(
                "ingestion {} has no visible_pixel_hash",
                ingestion_id
            ))
        })?;
        if record_vph != proposal.visible_pixel_hash {
            return Err(CoordError::Conflict(format!(
                "ingestion {} hash does not match proposal {}",
                ingestion_id, proposal_id
            )));
        }

        // Canonical payload, pinned first.
        let payload = build_envelope(&proposal, self.config.payload_max_tasks);
        let payload_json = serde_json::to_vec(&payload)?;
        let payload_cid = self
            .cas
            .pin(&payload_json, "payload.json")
            .await
            .map_err(CoordError::Ingest)?;

        let manifest_created_at = Utc::now();
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            proposal_id: proposal.id.clone(),
            visible_pixel_hash: proposal.visible_pixel_hash.clone(),
            payload_cid: payload_cid.clone(),
            created_at: manifest_created_at.to_rfc3339(),
            issuer: self.config.issuer.clone(),
        };
        let manifest_yaml = serde_yaml::to_string(&manifest)
            .map_err(|e| CoordError::Internal(format!("manifest yaml: {}", e)))?;

        // Drive the scanner, bounded by the inscribe timeout.
        let embed = tokio::time::timeout(
            Duration::from_secs(self.config.inscribe_timeout_secs),
            self.scanner.embed(
                &record.image_bytes,
                &self.config.method,
                manifest_yaml.as_bytes(),
                &record.filename,
            ),
        )
        .await
        .map_err(|_| CoordError::Provider("stego embed timed out".to_string()))?
        .map_err(CoordError::Ingest)?;

        // The scanner callback mints the stego record asynchronously.
        self.await_stego_record(&embed.stego_bytes, &manifest_yaml)
            .await;

        let contract_id = sha256_hex(&embed.stego_bytes);
        let stego_cid = self
            .cas
            .pin(&embed.stego_bytes, "stego.png")
            .await
            .map_err(CoordError::Ingest)?;

        // Record the artifacts on the proposal.
        let mut updated = proposal.clone();
        updated.metadata.insert(
            keys::PAYLOAD_CID.to_string(),
            MetaValue::Str(payload_cid.clone()),
        );
        updated.metadata.insert(
            keys::STEGO_IMAGE_CID.to_string(),
            MetaValue::Str(stego_cid.clone()),
        );
        updated.metadata.insert(
            keys::STEGO_CONTRACT_ID.to_string(),
            MetaValue::Str(contract_id.clone()),
        );
        updated.metadata.insert(
            keys::MANIFEST_CREATED_AT.to_string(),
            MetaValue::Str(manifest_created_at.to_rfc3339()),
        );
        updated.metadata.insert(
            keys::REQUEST_ID.to_string(),
            MetaValue::Str(embed.request_id.clone()),
        );
        self.coordination.store().put_proposal(&updated).await?;

        // The precursor wish contract is superseded by the republished one.
        let wish_contract = format!("wish-{}", proposal.visible_pixel_hash);
        match self
            .coordination
            .store()
            .set_contract_status(&wish_contract, ContractStatus::Superseded)
            .await
        {
            Ok(()) => debug!(contract = %wish_contract, "Wish contract superseded"),
            Err(CoordError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        if self.config.announce_enabled {
            let announcement = Announcement {
                kind: "stego",
                stego_cid: stego_cid.clone(),
                expected_hash: contract_id.clone(),
                proposal_id: proposal.id.clone(),
                visible_pixel_hash: proposal.visible_pixel_hash.clone(),
                payload_cid: payload_cid.clone(),
                issuer: self.config.issuer.clone(),
                timestamp: Utc::now().to_rfc3339(),
            };
            self.announcer
                .announce(&serde_json::to_value(&announcement)?)
                .await?;
        }

        self.coordination
            .emit(Event::new(
                "stego_publish",
                &proposal.id,
                &self.config.issuer,
                format!("stego_cid {}", stego_cid),
            ))
            .await?;

        info!(proposal_id, %contract_id, "Proposal republished");
        Ok(RepublishOutcome {
            payload_cid,
            stego_cid,
            contract_id,
            request_id: embed.request_id,
            performed: true,
        })
    }

    /// Poll the ingestion store for the stego record minted by the scanner
    /// callback; absence after the window is logged, not fatal.
    async fn await_stego_record(&self, stego_bytes: &[u8], manifest: &str) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.ingest_timeout_secs);
        loop {
            match self
                .ingestions
                .get_by_image_and_message(stego_bytes, manifest)
                .await
            {
                Ok(Some(record)) => {
                    debug!(record = %record.id, "Stego ingestion record observed");
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Ingestion poll failed: {}", e);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Stego ingestion record did not appear within the poll window");
                return;
            }
            tokio::time::sleep(Duration::from_secs(self.config.ingest_poll_secs)).await;
        }
    }
}

/// Build the canonical payload envelope: tasks sorted by id then title and
/// truncated, metadata sorted by key with scalar values only.
fn build_envelope(proposal: &Proposal, max_tasks: usize) -> PayloadEnvelope {
    let mut tasks: Vec<_> = proposal.tasks.clone();
    tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id).then(a.title.cmp(&b.title)));
    tasks.truncate(max_tasks);

    let metadata = scalar_metadata(&proposal.metadata);

    PayloadEnvelope {
        schema_version: SCHEMA_VERSION,
        proposal: PayloadProposal {
            id: proposal.id.clone(),
            title: proposal.title.clone(),
            description_md: proposal.description_md.clone(),
            budget_sats: proposal.budget_sats,
            visible_pixel_hash: proposal.visible_pixel_hash.clone(),
            created_at: proposal.created_at.to_rfc3339(),
        },
        tasks: tasks
            .into_iter()
            .map(|t| PayloadTask {
                task_id: t.task_id,
                title: t.title,
                description: t.description,
                budget_sats: t.budget_sats,
                skills: t.skills,
                contractor_wallet: String::new(),
            })
            .collect(),
        metadata,
    }
}

fn scalar_metadata(metadata: &Metadata) -> Vec<PayloadMetaEntry> {
    // BTreeMap iteration is already key-sorted.
    metadata
        .iter()
        .filter_map(|(key, value)| {
            value.to_scalar_string().map(|value| PayloadMetaEntry {
                key: key.clone(),
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProposalStatus, Task, TaskStatus};
    use crate::store::{CoordinationStore, MemoryStore};
    use base64::Engine;
    use stargate_ingest::cas::MemoryCas;
    use stargate_ingest::models::IngestionRecord;
    use stargate_ingest::scanner::StubScanner;
    use stargate_ingest::store::MemoryIngestionStore;
    use stargate_ingest::vph::Vph;
    use std::sync::Mutex;

    struct RecordingAnnouncer {
        seen: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn announce(&self, envelope: &serde_json::Value) -> Result<()> {
            self.seen.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    const COVER: &[u8] = b"fake cover png";
    const MESSAGE: &str = "Task: write spec\nBudget: 500";

    async fn setup(
        announce: bool,
    ) -> (
        Arc<CoordinationService>,
        Arc<MemoryIngestionStore>,
        Arc<RecordingAnnouncer>,
        StegoRepublisher,
        Proposal,
    ) {
        let coordination = Arc::new(CoordinationService::new(Arc::new(MemoryStore::new())));
        let ingestions = Arc::new(MemoryIngestionStore::new());
        let announcer = Arc::new(RecordingAnnouncer {
            seen: Mutex::new(vec![]),
        });

        let vph = Vph::compute(COVER, MESSAGE);

        let mut record_meta = Metadata::new();
        record_meta.insert(keys::EMBEDDED_MESSAGE.into(), MESSAGE.into());
        record_meta.insert(keys::VISIBLE_PIXEL_HASH.into(), vph.as_str().into());
        let record = IngestionRecord::new(
            vph.as_str(),
            "cover.png",
            "alpha",
            &base64::engine::general_purpose::STANDARD.encode(COVER),
            record_meta,
        )
        .unwrap();
        ingestions.create(&record).await.unwrap();

        let mut proposal_meta = Metadata::new();
        proposal_meta.insert(keys::INGESTION_ID.into(), vph.as_str().into());
        let proposal = Proposal {
            id: "prop-1".to_string(),
            title: "Wish".to_string(),
            description_md: MESSAGE.to_string(),
            visible_pixel_hash: vph.to_string(),
            budget_sats: 500,
            tasks: vec![Task {
                task_id: "t-2".to_string(),
                contract_id: vph.to_string(),
                goal_id: "g".to_string(),
                title: "b".to_string(),
                description: String::new(),
                budget_sats: 250,
                skills: vec![],
                status: TaskStatus::Available,
                claimed_by: None,
                claim_expires_at: None,
                merkle_proof: None,
            }, Task {
                task_id: "t-1".to_string(),
                contract_id: vph.to_string(),
                goal_id: "g".to_string(),
                title: "a".to_string(),
                description: String::new(),
                budget_sats: 250,
                skills: vec!["rust".to_string()],
                status: TaskStatus::Available,
                claimed_by: None,
                claim_expires_at: None,
                merkle_proof: None,
            }],
            metadata: proposal_meta,
            status: ProposalStatus::Approved,
            created_at: Utc::now(),
        };
        coordination.store().put_proposal(&proposal).await.unwrap();

        let republisher = StegoRepublisher::new(
            coordination.clone(),
            ingestions.clone(),
            ScannerHandle::new(Arc::new(StubScanner)),
            Arc::new(MemoryCas::default()),
            announcer.clone(),
            RepublishConfig {
                announce_enabled: announce,
                ingest_timeout_secs: 0,
                ingest_poll_secs: 1,
                ..Default::default()
            },
        );

        (coordination, ingestions, announcer, republisher, proposal)
    }

    #[tokio::test]
    async fn test_republish_pins_and_records_metadata() {
        let (coordination, _ingestions, _announcer, republisher, proposal) = setup(false).await;

        let outcome = republisher.republish(&proposal.id).await.unwrap();
        assert!(outcome.performed);
        // Stub embed passes the cover through, so the contract id is the
        // digest of the cover bytes.
        assert_eq!(outcome.contract_id, sha256_hex(COVER));

        let updated = coordination.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(
            updated.metadata.str_value(keys::STEGO_CONTRACT_ID),
            Some(outcome.contract_id.as_str())
        );
        assert_eq!(
            updated.metadata.str_value(keys::STEGO_IMAGE_CID),
            Some(outcome.stego_cid.as_str())
        );
        assert!(updated.metadata.str_value(keys::PAYLOAD_CID).is_some());
        assert!(updated.metadata.str_value(keys::REQUEST_ID).is_some());

        // Event recorded.
        let events = coordination
            .recent_events(Some(&proposal.id), 10)
            .await
            .unwrap();
        assert!(events.iter().any(|e| e.event_type == "stego_publish"));
    }

    #[tokio::test]
    async fn test_republish_is_idempotent() {
        let (coordination, _ingestions, _announcer, republisher, proposal) = setup(false).await;

        let first = republisher.republish(&proposal.id).await.unwrap();
        let metadata_after_first = coordination
            .get_proposal(&proposal.id)
            .await
            .unwrap()
            .metadata;

        let second = republisher.republish(&proposal.id).await.unwrap();
        assert!(!second.performed);
        assert_eq!(second.contract_id, first.contract_id);
        assert_eq!(second.stego_cid, first.stego_cid);

        let metadata_after_second = coordination
            .get_proposal(&proposal.id)
            .await
            .unwrap()
            .metadata;
        assert_eq!(metadata_after_first, metadata_after_second);
    }

    #[tokio::test]
    async fn test_republish_supersedes_wish_contract() {
        let (coordination, _ingestions, _announcer, republisher, proposal) = setup(false).await;

        let now = Utc::now();
        let wish = crate::models::Contract {
            contract_id: format!("wish-{}", proposal.visible_pixel_hash),
            title: "wish".to_string(),
            total_budget_sats: 500,
            goals_count: 1,
            available_tasks_count: 0,
            status: ContractStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        coordination
            .store()
            .upsert_contract(&wish, &[])
            .await
            .unwrap();

        republisher.republish(&proposal.id).await.unwrap();

        let archived = coordination
            .store()
            .get_contract(&wish.contract_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, ContractStatus::Superseded);
    }

    #[tokio::test]
    async fn test_republish_announces_expected_shape() {
        let (_coordination, _ingestions, announcer, republisher, proposal) = setup(true).await;

        let outcome = republisher.republish(&proposal.id).await.unwrap();

        let seen = announcer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let envelope = &seen[0];
        assert_eq!(envelope["type"], "stego");
        assert_eq!(envelope["expected_hash"], outcome.contract_id.as_str());
        assert_eq!(envelope["stego_cid"], outcome.stego_cid.as_str());
        assert_eq!(envelope["proposal_id"], proposal.id.as_str());
        assert_eq!(
            envelope["visible_pixel_hash"],
            proposal.visible_pixel_hash.as_str()
        );
        assert!(envelope["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_republish_requires_matching_vph() {
        let (coordination, _ingestions, _announcer, republisher, mut proposal) = setup(false).await;

        proposal.visible_pixel_hash = "00".repeat(32);
        coordination.store().put_proposal(&proposal).await.unwrap();

        let err = republisher.republish(&proposal.id).await.unwrap_err();
        assert!(matches!(err, CoordError::Conflict(_)));

        // Partial progress is not persisted.
        let unchanged = coordination.get_proposal(&proposal.id).await.unwrap();
        assert!(unchanged.metadata.str_value(keys::STEGO_CONTRACT_ID).is_none());
    }

    #[tokio::test]
    async fn test_envelope_tasks_sorted_and_metadata_scalar_only() {
        let (_coordination, _ingestions, _announcer, _republisher, mut proposal) =
            setup(false).await;
        proposal.metadata.insert(
            "structured".to_string(),
            MetaValue::Other(serde_json::json!({"a": 1})),
        );
        proposal
            .metadata
            .insert("zeta".to_string(), MetaValue::Int(9));

        let envelope = build_envelope(&proposal, 2000);
        let ids: Vec<&str> = envelope.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t-1", "t-2"]);

        let keys: Vec<&str> = envelope.metadata.iter().map(|m| m.key.as_str()).collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        assert!(!keys.contains(&"structured"));
        assert!(keys.contains(&"zeta"));
    }

    #[tokio::test]
    async fn test_envelope_truncates_tasks() {
        let (_c, _i, _a, _r, mut proposal) = setup(false).await;
        let template = proposal.tasks[0].clone();
        proposal.tasks = (0..10)
            .map(|i| {
                let mut t = template.clone();
                t.task_id = format!("t-{:02}", i);
                t
            })
            .collect();

        let envelope = build_envelope(&proposal, 3);
        assert_eq!(envelope.tasks.len(), 3);
    }

    #[test]
    fn test_manifest_yaml_key_order() {
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            proposal_id: "prop-1".to_string(),
            visible_pixel_hash: "ab".repeat(32),
            payload_cid: "cid-1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            issuer: "stargate".to_string(),
        };
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let key_positions: Vec<usize> = [
            "schema_version",
            "proposal_id",
            "visible_pixel_hash",
            "payload_cid",
            "created_at",
            "issuer",
        ]
        .iter()
        .map(|k| yaml.find(&format!("{}:", k)).unwrap())
        .collect();
        assert!(key_positions.windows(2).all(|w| w[0] < w[1]));
    }
}
