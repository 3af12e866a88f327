//! On-disk layout for index generations.
//!
//! ```text
//! <index_dir>/
//!   CURRENT                      manifest naming the published generation
//!   generations/<id>.json        one self-describing snapshot per generation
//! ```
//!
//! Files are written to a `.tmp` sibling and renamed into place. Renaming the
//! manifest is the publish point: a reader sees either the previous
//! generation or the new one, never a partially written file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::index::{IndexDescriptor, IndexGeneration};

/// Version of the snapshot and manifest file format.
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";

/// Contents of the `CURRENT` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Manifest {
    format_version: u32,
    #[serde(flatten)]
    descriptor: IndexDescriptor,
}

/// Reads and writes index generations under one root directory.
#[derive(Debug, Clone)]
pub struct IndexStorage {
    root: PathBuf,
}

impl IndexStorage {
    /// Use `root` as the index directory. Nothing is touched until a read or write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The index directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn generation_path(&self, generation_id: &str) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(format!("{generation_id}.json"))
    }

    /// Read the descriptor of the published generation, if any.
    pub async fn read_manifest(&self) -> Result<Option<IndexDescriptor>> {
        let path = self.manifest_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::storage(
                path,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    manifest.format_version
                ),
            ));
        }
        Ok(Some(manifest.descriptor))
    }

    /// Load the published generation, or `None` if nothing was ever published.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] if the snapshot disagrees with the manifest.
    pub async fn load_current(&self) -> Result<Option<IndexGeneration>> {
        let Some(descriptor) = self.read_manifest().await? else {
            return Ok(None);
        };

        let path = self.generation_path(&descriptor.generation_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            RagError::storage(&path, format!("published generation unreadable: {e}"))
        })?;
        let generation: IndexGeneration = serde_json::from_slice(&bytes)?;

        if generation.format_version() != FORMAT_VERSION {
            return Err(RagError::storage(
                path,
                format!("unsupported format version {}", generation.format_version()),
            ));
        }
        if generation.descriptor() != descriptor {
            return Err(RagError::storage(path, "snapshot does not match the CURRENT manifest"));
        }
        generation.verify()?;

        debug!(generation = %descriptor.generation_id, "loaded index generation");
        Ok(Some(generation))
    }

    /// Write a generation's snapshot file. Does not publish it.
    pub async fn write_generation(&self, generation: &IndexGeneration) -> Result<()> {
        let bytes = serde_json::to_vec(generation)?;
        write_atomic(&self.generation_path(generation.id()), &bytes).await
    }

    /// Point `CURRENT` at a generation whose snapshot has been written.
    pub async fn publish(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let manifest = Manifest { format_version: FORMAT_VERSION, descriptor: descriptor.clone() };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&self.manifest_path(), &bytes).await
    }

    /// Remove a generation's snapshot file.
    pub async fn remove_generation(&self, generation_id: &str) -> Result<()> {
        tokio::fs::remove_file(self.generation_path(generation_id)).await?;
        Ok(())
    }

    /// Delete every snapshot not named in `keep`. Failures are logged, not returned.
    pub async fn prune(&self, keep: &[&str]) {
        let dir = self.root.join(GENERATIONS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list generations for pruning");
                return;
            }
        };
        let keep_names: Vec<String> = keep.iter().map(|id| format!("{id}.json")).collect();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "generation listing failed");
                    break;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if keep_names.contains(&name) {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!(path = %entry.path().display(), error = %e, "failed to prune generation");
            }
        }
    }
}

/// Write `bytes` to `path` via a synced temporary file and a rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
