//! Flat exact nearest-neighbour index persisted as a directory
//!
//! Layout of an index directory:
//!
//! ```text
//! manifest.json   format version, model, dimensions, count, fingerprint
//! chunks.json     chunk texts and metadata, in vector order
//! vectors.bin     row-major f32 matrix (bincode)
//! ```
//!
//! Publishing writes a complete staging directory next to the target and
//! renames it into place, so readers only ever see a finished index.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Chunk, RetrievalResult};

/// On-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Index description written alongside the data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Format version
    pub version: u32,
    /// Embedding model the vectors came from
    pub embedding_model: String,
    /// Vector dimensions
    pub dimensions: usize,
    /// Number of chunks
    pub count: usize,
    /// Build time
    pub created_at: DateTime<Utc>,
    /// SHA-256 over chunk ids and texts
    pub fingerprint: String,
}

#[derive(Serialize, Deserialize)]
struct VectorMatrix {
    dimensions: usize,
    data: Vec<f32>,
}

/// In-memory exact index over chunk embeddings
#[derive(Debug, Clone)]
pub struct FlatIndex {
    chunks: Vec<Chunk>,
    /// Row-major, `chunks.len() * dimensions`
    vectors: Vec<f32>,
    dimensions: usize,
    embedding_model: String,
}

impl FlatIndex {
    /// Build an index from chunks and their embeddings, position for position
    pub fn build(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        embedding_model: impl Into<String>,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::vector_index("cannot build an index without chunks"));
        }
        if chunks.len() != vectors.len() {
            return Err(Error::vector_index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimensions = vectors[0].len();
        if dimensions == 0 {
            return Err(Error::vector_index("embeddings have zero dimensions"));
        }

        let mut flat = Vec::with_capacity(chunks.len() * dimensions);
        for (i, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(Error::vector_index(format!(
                    "embedding {} has {} dimensions, expected {}",
                    i,
                    vector.len(),
                    dimensions
                )));
            }
            flat.extend(vector);
        }

        Ok(Self {
            chunks,
            vectors: flat,
            dimensions,
            embedding_model: embedding_model.into(),
        })
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Indexed chunks in vector order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// The `k` nearest chunks by squared L2 distance, closest first
    ///
    /// Ties keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if query.len() != self.dimensions {
            return Err(Error::vector_index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_chunks(self.dimensions)
            .enumerate()
            .map(|(i, row)| (i, squared_l2(query, row)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| RetrievalResult {
                chunk: self.chunks[i].clone(),
                distance,
            })
            .collect())
    }

    /// SHA-256 over chunk ids and texts
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.chunks)
    }

    /// Manifest describing this index
    pub fn manifest(&self) -> IndexManifest {
        IndexManifest {
            version: INDEX_FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            count: self.chunks.len(),
            created_at: Utc::now(),
            fingerprint: self.fingerprint(),
        }
    }

    /// Whether `dir` (or its backup from an interrupted swap) holds an index
    pub fn is_present(dir: &Path) -> bool {
        Self::has_manifest(dir) || backup_path(dir).is_some_and(|b| Self::has_manifest(&b))
    }

    fn has_manifest(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file()
    }

    /// Publish the index to `dir`, replacing any previous index
    ///
    /// The previous index is moved to a sibling `.{name}-previous` directory
    /// before the staging directory is renamed into place. Between the two
    /// renames `dir` does not exist; `load` falls back to the sibling in that
    /// window, and a later `persist` restores it first if a crash left only
    /// the sibling behind.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let (parent, name) = split_index_path(dir)?;
        fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-staging-", name))
            .tempdir_in(&parent)?;
        self.write_files(staging.path())?;

        let backup = parent.join(format!(".{}-previous", name));
        if backup.exists() {
            if dir.exists() {
                fs::remove_dir_all(&backup)?;
            } else {
                tracing::warn!(
                    "Restoring index from interrupted swap at {}",
                    backup.display()
                );
                fs::rename(&backup, dir)?;
            }
        }

        let had_previous = dir.exists();
        if had_previous {
            fs::rename(dir, &backup)?;
        }

        if let Err(e) = fs::rename(staging.path(), dir) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, dir) {
                    tracing::error!("Failed to restore previous index: {}", restore);
                }
            }
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&backup) {
                tracing::warn!("Failed to remove previous index {}: {}", backup.display(), e);
            }
        }

        tracing::info!(
            "Persisted index with {} chunks ({} dims) to {}",
            self.len(),
            self.dimensions,
            dir.display()
        );
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> Result<()> {
        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&self.manifest())?,
        )?;
        fs::write(dir.join(CHUNKS_FILE), serde_json::to_vec(&self.chunks)?)?;

        let matrix = VectorMatrix {
            dimensions: self.dimensions,
            data: self.vectors.clone(),
        };
        let bytes = bincode::serde::encode_to_vec(&matrix, bincode::config::standard())
            .map_err(|e| Error::vector_index(format!("failed to encode vectors: {}", e)))?;
        fs::write(dir.join(VECTORS_FILE), bytes)?;

        Ok(())
    }

    /// Load a published index from `dir`
    ///
    /// While a swap is in progress `dir` is briefly missing and the previous
    /// index is read from its backup instead.
    pub fn load(dir: &Path) -> Result<Self> {
        if Self::has_manifest(dir) {
            return Self::read_dir(dir);
        }

        match backup_path(dir) {
            Some(backup) if Self::has_manifest(&backup) => {
                tracing::warn!(
                    "Index missing at {}, loading previous index from {}",
                    dir.display(),
                    backup.display()
                );
                Self::read_dir(&backup)
            }
            _ => Err(Error::IndexNotFound {
                path: dir.to_path_buf(),
            }),
        }
    }

    fn read_dir(dir: &Path) -> Result<Self> {
        let manifest: IndexManifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?;
        if manifest.version != INDEX_FORMAT_VERSION {
            return Err(Error::vector_index(format!(
                "unsupported index format version {} (expected {})",
                manifest.version, INDEX_FORMAT_VERSION
            )));
        }

        let chunks: Vec<Chunk> = serde_json::from_slice(&fs::read(dir.join(CHUNKS_FILE))?)?;

        let bytes = fs::read(dir.join(VECTORS_FILE))?;
        let (matrix, _): (VectorMatrix, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| Error::vector_index(format!("failed to decode vectors: {}", e)))?;

        if chunks.len() != manifest.count
            || matrix.dimensions != manifest.dimensions
            || matrix.data.len() != manifest.count * manifest.dimensions
        {
            return Err(Error::vector_index(format!(
                "index at '{}' is inconsistent with its manifest",
                dir.display()
            )));
        }

        if fingerprint(&chunks) != manifest.fingerprint {
            return Err(Error::vector_index(format!(
                "chunk fingerprint mismatch in '{}'",
                dir.display()
            )));
        }

        tracing::info!(
            "Loaded index with {} chunks ({} dims, model {}) from {}",
            chunks.len(),
            matrix.dimensions,
            manifest.embedding_model,
            dir.display()
        );

        Ok(Self {
            chunks,
            vectors: matrix.data,
            dimensions: matrix.dimensions,
            embedding_model: manifest.embedding_model,
        })
    }
}

/// Parent directory and final component of an index path
fn split_index_path(dir: &Path) -> Result<(PathBuf, String)> {
    let name = dir
        .file_name()
        .ok_or_else(|| Error::config(format!("invalid index path '{}'", dir.display())))?
        .to_string_lossy()
        .to_string();
    let parent = match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

/// Where `persist` parks the previous index during a swap
fn backup_path(dir: &Path) -> Option<PathBuf> {
    let (parent, name) = split_index_path(dir).ok()?;
    Some(parent.join(format!(".{}-previous", name)))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.chunk_id().to_le_bytes());
        hasher.update(chunk.content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
