//! Flat inner-product vector index.
//!
//! [`VectorIndex`] stores L2-normalized vectors row-major in a single `Vec<f32>`
//! and answers top-k queries by exhaustive dot product, so a score is the
//! cosine similarity between the query and the stored vector. It is built
//! once and never mutated afterwards.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DocQaError, Result};

const FORMAT_VERSION: u32 = 1;

/// One search hit: the stored vector's position and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the vector in insertion order.
    pub position: usize,
    /// Inner product with the query.
    pub score: f32,
}

/// An immutable exact nearest-neighbor index over inner product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    format_version: u32,
    dimensions: usize,
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from vectors of equal dimension.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Index`] if `vectors` is empty, the dimension is
    /// zero, or the vectors differ in length.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let dimensions = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| DocQaError::Index("cannot build an index from zero vectors".into()))?;
        if dimensions == 0 {
            return Err(DocQaError::Index("vectors must have at least one dimension".into()));
        }

        let mut flat = Vec::with_capacity(dimensions * vectors.len());
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(DocQaError::Index(format!(
                    "vector {position} has {} dimensions, expected {dimensions}",
                    vector.len()
                )));
            }
            flat.extend_from_slice(vector);
        }

        Ok(Self { format_version: FORMAT_VERSION, dimensions, vectors: flat })
    }

    /// Dimensionality of the stored vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimensions
    }

    /// Returns `true` if the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Return the `k` stored vectors with the highest inner product against
    /// `query`, best first. Fewer than `k` hits are returned when the index
    /// is smaller than `k`; ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Index`] if the query dimension does not match.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimensions {
            return Err(DocQaError::Index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                score: row.iter().zip(query).map(|(a, b)| a * b).sum(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.position.cmp(&b.position)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Write the index to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Io`] or [`DocQaError::Serialization`] on failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| DocQaError::Serialization(format!("{}: {e}", path.display())))?;
        writer.flush()?;
        debug!(path = %path.display(), vectors = self.len(), "saved vector index");
        Ok(())
    }

    /// Read an index previously written with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::IndexMissing`] if the file does not exist,
    /// [`DocQaError::Serialization`] if it cannot be decoded, and
    /// [`DocQaError::Index`] if its contents are inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DocQaError::IndexMissing { path: path.to_path_buf() });
        }
        let reader = BufReader::new(File::open(path)?);
        let index: VectorIndex = bincode::deserialize_from(reader)
            .map_err(|e| DocQaError::Serialization(format!("{}: {e}", path.display())))?;

        if index.format_version != FORMAT_VERSION {
            return Err(DocQaError::Index(format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                index.format_version
            )));
        }
        if index.dimensions == 0 || index.vectors.len() % index.dimensions != 0 {
            return Err(DocQaError::Index(format!(
                "corrupt index: {} values do not divide into {}-dimensional vectors",
                index.vectors.len(),
                index.dimensions
            )));
        }
        Ok(index)
    }
}
