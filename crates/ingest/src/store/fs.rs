//! Filesystem block store.
//!
//! Layout: `<blocks_dir>/block_<height>.json` for artifacts and
//! `<blocks_dir>/<height>_<hash>/images/<safe_filename>` for extracted
//! bytes.  Artifact writes go through a temp file and rename so readers
//! never observe a torn artifact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::models::BlockArtifact;
use crate::paths::safe_join;
use crate::store::BlockStore;

pub struct FsBlockStore {
    blocks_dir: PathBuf,
}

impl FsBlockStore {
    pub fn new(blocks_dir: impl Into<PathBuf>) -> Self {
        Self {
            blocks_dir: blocks_dir.into(),
        }
    }

    fn artifact_path(&self, height: u64) -> PathBuf {
        self.blocks_dir.join(format!("block_{}.json", height))
    }

    /// Directory for a block's extracted images.
    pub fn images_dir(&self, height: u64, block_hash: &str) -> PathBuf {
        self.blocks_dir
            .join(format!("{}_{}", height, block_hash))
            .join("images")
    }

    /// Persist one extracted image under the block's images directory,
    /// returning its path relative to the blocks root.
    pub async fn write_image(
        &self,
        height: u64,
        block_hash: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let dir = self.images_dir(height, block_hash);
        tokio::fs::create_dir_all(&dir).await?;

        let target = safe_join(&dir, file_name)?;
        tokio::fs::write(&target, bytes).await?;

        let relative = target
            .strip_prefix(&self.blocks_dir)
            .map_err(|_| IngestError::InvalidPath {
                name: file_name.to_string(),
                reason: "resolved outside blocks root".to_string(),
            })?;
        Ok(relative.to_string_lossy().into_owned())
    }

    /// Read a file previously written under the blocks root; the relative
    /// path is re-checked for containment before any access.
    pub async fn read_relative(&self, relative: &str) -> Result<Vec<u8>> {
        let parent = Path::new(relative)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        let dir = self.blocks_dir.join(parent);
        let name = Path::new(relative)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::InvalidPath {
                name: relative.to_string(),
                reason: "no file name".to_string(),
            })?;

        let target = safe_join(&dir, name)?;
        if !target.starts_with(&self.blocks_dir) {
            return Err(IngestError::InvalidPath {
                name: relative.to_string(),
                reason: "escapes blocks root".to_string(),
            });
        }
        Ok(tokio::fs::read(&target).await?)
    }
}

#[async_trait]
impl BlockStore for FsBlockStore {
    async fn put(&self, artifact: &BlockArtifact) -> Result<()> {
        tokio::fs::create_dir_all(&self.blocks_dir).await?;

        let path = self.artifact_path(artifact.block_height);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(artifact)?;
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(
            height = artifact.block_height,
            path = %path.display(),
            "Persisted block artifact"
        );
        Ok(())
    }

    async fn get(&self, height: u64) -> Result<Option<BlockArtifact>> {
        let path = self.artifact_path(height);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn heights(&self, limit: usize) -> Result<Vec<u64>> {
        let mut heights = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.blocks_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(heights),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(h) = name
                .strip_prefix("block_")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|h| h.parse::<u64>().ok())
            {
                heights.push(h);
            }
        }

        heights.sort_unstable_by(|a, b| b.cmp(a));
        heights.truncate(limit);
        Ok(heights)
    }
}
