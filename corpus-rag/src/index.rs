//! Vector index with generation-based atomic rebuilds.
//!
//! A [`VectorIndex`] publishes at most one [`IndexGeneration`] at a time.
//! [`VectorIndex::build`] assembles and validates a complete new generation,
//! persists it when the index is backed by a directory, and only then swaps
//! the published pointer. Readers clone the `Arc` of the current generation
//! and search it without holding any lock, so a search that starts before a
//! rebuild finishes against the old generation, and one that starts after
//! sees only the new one.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::document::{Citation, IndexEntry, RankedResult};
use crate::embedding::{check_vector, dot, l2_normalize};
use crate::error::{RagError, Result};
use crate::storage::{FORMAT_VERSION, IndexStorage};

/// Summary of a generation: what model built it and how large it is.
///
/// This is also what the `CURRENT` manifest records on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Unique id of the generation.
    pub generation_id: String,
    /// Embedding model version shared by every record.
    pub model_version: String,
    /// Vector length shared by every record.
    pub dimensions: usize,
    /// Number of indexed passages.
    pub passage_count: usize,
}

/// One immutable, fully validated set of indexed passages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexGeneration {
    format_version: u32,
    generation_id: String,
    model_version: String,
    dimensions: usize,
    passage_count: usize,
    created_at: DateTime<Utc>,
    /// Sorted by passage id; vectors are unit length (or zero).
    entries: Vec<IndexEntry>,
}

impl IndexGeneration {
    /// Validate entries and assemble a new generation.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for an empty model version or zero dimensions
    /// - [`RagError::ModelVersionMismatch`] if a record was embedded by another model
    /// - [`RagError::DimensionMismatch`] / [`RagError::InvalidVector`] for bad vectors
    /// - [`RagError::MalformedRecord`] for inconsistent or duplicate passages
    fn assemble(
        model_version: &str,
        dimensions: usize,
        mut entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if model_version.trim().is_empty() {
            return Err(RagError::ConfigError("model_version must not be empty".into()));
        }
        if dimensions == 0 {
            return Err(RagError::ConfigError("dimensions must be greater than zero".into()));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &mut entries {
            entry.passage.validate()?;
            let id = entry.passage.id();
            if entry.record.passage_id != id {
                return Err(RagError::MalformedRecord(format!(
                    "record for {} attached to passage {id}",
                    entry.record.passage_id
                )));
            }
            if entry.record.model_version != model_version {
                return Err(RagError::ModelVersionMismatch {
                    expected: model_version.to_string(),
                    actual: entry.record.model_version.clone(),
                });
            }
            check_vector(&entry.record.vector, dimensions)?;
            if !seen.insert(id.clone()) {
                return Err(RagError::MalformedRecord(format!("duplicate passage {id}")));
            }
            l2_normalize(&mut entry.record.vector);
        }
        entries.sort_by(|a, b| a.record.passage_id.cmp(&b.record.passage_id));

        let created_at = Utc::now();
        let generation_id = generation_id(created_at, model_version, &entries)?;

        Ok(Self {
            format_version: FORMAT_VERSION,
            generation_id,
            model_version: model_version.to_string(),
            dimensions,
            passage_count: entries.len(),
            created_at,
            entries,
        })
    }

    /// The generation id.
    pub fn id(&self) -> &str {
        &self.generation_id
    }

    /// The embedding model version of every record.
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// The vector length of every record.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// When the generation was built.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of indexed passages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the generation holds no passages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The indexed entries, sorted by passage id.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub(crate) fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Re-check the invariants of a generation read back from disk.
    pub(crate) fn verify(&self) -> Result<()> {
        if self.entries.len() != self.passage_count {
            return Err(RagError::MalformedRecord(format!(
                "generation {} declares {} passages but holds {}",
                self.generation_id,
                self.passage_count,
                self.entries.len()
            )));
        }
        for entry in &self.entries {
            entry.passage.validate()?;
            if entry.record.model_version != self.model_version {
                return Err(RagError::ModelVersionMismatch {
                    expected: self.model_version.clone(),
                    actual: entry.record.model_version.clone(),
                });
            }
            check_vector(&entry.record.vector, self.dimensions)?;
        }
        Ok(())
    }

    /// Summary of this generation.
    pub fn descriptor(&self) -> IndexDescriptor {
        IndexDescriptor {
            generation_id: self.generation_id.clone(),
            model_version: self.model_version.clone(),
            dimensions: self.dimensions,
            passage_count: self.passage_count,
        }
    }

    /// Fail unless vectors from `model_version` with `dimensions` components
    /// are comparable with this generation.
    pub fn ensure_compatible(&self, model_version: &str, dimensions: usize) -> Result<()> {
        if model_version != self.model_version {
            return Err(RagError::ModelVersionMismatch {
                expected: self.model_version.clone(),
                actual: model_version.to_string(),
            });
        }
        if dimensions != self.dimensions {
            return Err(RagError::DimensionMismatch { expected: self.dimensions, actual: dimensions });
        }
        Ok(())
    }

    /// Return the `k` passages most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores are
    /// ordered by ascending passage id. With a `category` filter only
    /// passages of that category are ranked. Fewer than `k` results are
    /// returned when fewer passages qualify.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] or [`RagError::InvalidVector`]
    /// if the query vector is not comparable with the indexed vectors.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RankedResult>> {
        check_vector(query, self.dimensions)?;
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .filter(|entry| category.is_none_or(|c| entry.passage.category == c))
            .map(|entry| (dot(&entry.record.vector, &query), entry))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.record.passage_id.cmp(&b.record.passage_id))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| RankedResult {
                passage_id: entry.record.passage_id.clone(),
                score,
                text: entry.passage.text.clone(),
                citation: Citation::from_passage(&entry.passage),
            })
            .collect())
    }
}

/// Content-derived id, prefixed with the build time for readability.
fn generation_id(
    created_at: DateTime<Utc>,
    model_version: &str,
    entries: &[IndexEntry],
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(created_at.to_rfc3339().as_bytes());
    hasher.update(model_version.as_bytes());
    hasher.update(serde_json::to_vec(entries)?);
    let hash = format!("{:x}", hasher.finalize());
    Ok(format!("{}-{}", created_at.format("%Y%m%dT%H%M%S"), &hash[..12]))
}

/// A persistent similarity index over passage embeddings.
///
/// All query-time methods take `&self` and may be called concurrently.
/// [`build`](VectorIndex::build) calls are serialised internally.
///
/// # Example
///
/// ```rust,ignore
/// use corpus_rag::VectorIndex;
///
/// let index = VectorIndex::open("./data/vector_store").await?;
/// index.build("hashing-v1/384", 384, entries).await?;
/// let results = index.search(&query_vector, 10, None).await?;
/// ```
#[derive(Debug, Default)]
pub struct VectorIndex {
    storage: Option<IndexStorage>,
    published: RwLock<Option<Arc<IndexGeneration>>>,
    build_lock: Mutex<()>,
}

impl VectorIndex {
    /// Create an index that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a directory-backed index, loading its published generation.
    ///
    /// A directory without a published generation yields an index that has
    /// never been built.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`], [`RagError::Io`] or
    /// [`RagError::Serialization`] if the published generation cannot be loaded.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = IndexStorage::new(dir);
        let current = storage.load_current().await?;
        if let Some(generation) = &current {
            info!(
                generation = generation.id(),
                passage_count = generation.len(),
                dir = %storage.root().display(),
                "opened vector index"
            );
        }
        Ok(Self {
            storage: Some(storage),
            published: RwLock::new(current.map(Arc::new)),
            build_lock: Mutex::new(()),
        })
    }

    /// Replace the index contents with `entries`.
    ///
    /// Either the whole new generation is published or, on error, the
    /// previously published generation stays in place untouched.
    ///
    /// # Errors
    ///
    /// See [`IndexGeneration`] validation errors; persistence failures are
    /// returned as [`RagError::Io`] / [`RagError::Serialization`].
    pub async fn build(
        &self,
        model_version: &str,
        dimensions: usize,
        entries: Vec<IndexEntry>,
    ) -> Result<IndexDescriptor> {
        let _writer = self.build_lock.lock().await;

        let generation = Arc::new(IndexGeneration::assemble(model_version, dimensions, entries)?);
        let descriptor = generation.descriptor();

        // Kept on disk after publishing, for readers that loaded the old manifest.
        let mut superseded = None;
        if let Some(storage) = &self.storage {
            superseded = match storage.read_manifest().await {
                Ok(manifest) => manifest.map(|d| d.generation_id),
                Err(e) => {
                    warn!(error = %e, "unreadable manifest before publish");
                    None
                }
            };
            storage.write_generation(&generation).await?;
            if let Err(e) = storage.publish(&descriptor).await {
                if let Err(cleanup) = storage.remove_generation(generation.id()).await {
                    warn!(generation = generation.id(), error = %cleanup, "orphaned generation file");
                }
                return Err(e);
            }
        }

        *self.published.write().await = Some(Arc::clone(&generation));

        if let Some(storage) = &self.storage {
            let mut keep = vec![generation.id()];
            keep.extend(superseded.as_deref());
            storage.prune(&keep).await;
        }

        info!(
            generation = %descriptor.generation_id,
            model_version = %descriptor.model_version,
            passage_count = descriptor.passage_count,
            "published index generation"
        );
        Ok(descriptor)
    }

    /// The currently published generation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if nothing has been built yet.
    pub async fn current(&self) -> Result<Arc<IndexGeneration>> {
        self.published.read().await.clone().ok_or(RagError::IndexUnavailable)
    }

    /// Search the published generation. See [`IndexGeneration::search`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if nothing has been built yet.
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RankedResult>> {
        self.current().await?.search(query, k, category)
    }

    /// Number of indexed passages; zero if nothing has been built.
    pub async fn size(&self) -> usize {
        self.published.read().await.as_ref().map_or(0, |g| g.len())
    }

    /// Whether a generation has been published.
    pub async fn is_built(&self) -> bool {
        self.published.read().await.is_some()
    }

    /// Descriptor of the published generation, if any.
    pub async fn descriptor(&self) -> Option<IndexDescriptor> {
        self.published.read().await.as_ref().map(|g| g.descriptor())
    }

    /// Fail unless the published generation was built by `model_version`
    /// with `dimensions`-component vectors.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexUnavailable`], [`RagError::ModelVersionMismatch`] or
    /// [`RagError::DimensionMismatch`].
    pub async fn ensure_compatible(&self, model_version: &str, dimensions: usize) -> Result<()> {
        self.current().await?.ensure_compatible(model_version, dimensions)
    }

    /// Pick up a generation published by another process.
    ///
    /// Returns `true` if a different generation is now published. In-memory
    /// indexes always return `false`.
    pub async fn reload(&self) -> Result<bool> {
        let Some(storage) = &self.storage else {
            return Ok(false);
        };
        let _writer = self.build_lock.lock().await;

        let on_disk = storage.read_manifest().await?;
        let published = self.descriptor().await;
        if on_disk.is_none() || on_disk == published {
            return Ok(false);
        }

        let Some(generation) = storage.load_current().await? else {
            return Ok(false);
        };
        info!(generation = generation.id(), "reloaded index generation");
        *self.published.write().await = Some(Arc::new(generation));
        Ok(true)
    }
}
