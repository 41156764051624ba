//! The persisted index: vectors and metadata as one unit.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DocQaError, Result};
use crate::index::VectorIndex;
use crate::metadata::MetadataStore;

/// Default file name of the vector index inside an index directory.
pub const INDEX_FILE_NAME: &str = "doc_index.bin";
/// Default file name of the metadata store inside an index directory.
pub const METADATA_FILE_NAME: &str = "doc_metadata.json";

/// Locations of the two artifacts that make up an [`IndexedCorpus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl CorpusPaths {
    /// The default artifact names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self { index: dir.join(INDEX_FILE_NAME), metadata: dir.join(METADATA_FILE_NAME) }
    }
}

/// A vector index and its metadata store, guaranteed to be the same length.
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    index: VectorIndex,
    metadata: MetadataStore,
}

impl IndexedCorpus {
    /// Pair an index with its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::CorpusMismatch`] if their lengths differ.
    pub fn new(index: VectorIndex, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(DocQaError::CorpusMismatch {
                vectors: index.len(),
                records: metadata.len(),
            });
        }
        Ok(Self { index, metadata })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Write both artifacts, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization failures.
    pub fn save(&self, paths: &CorpusPaths) -> Result<()> {
        for path in [&paths.index, &paths.metadata] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.index.save(&paths.index)?;
        self.metadata.save(&paths.metadata)?;
        info!(
            index = %paths.index.display(),
            metadata = %paths.metadata.display(),
            chunks = self.len(),
            "saved indexed corpus"
        );
        Ok(())
    }

    /// Load both artifacts and check that they agree.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::IndexMissing`] if either file is absent and
    /// [`DocQaError::CorpusMismatch`] if their lengths differ.
    pub fn load(paths: &CorpusPaths) -> Result<Self> {
        let index = VectorIndex::load(&paths.index)?;
        let metadata = MetadataStore::load(&paths.metadata)?;
        let corpus = Self::new(index, metadata)?;
        info!(chunks = corpus.len(), dimensions = corpus.index.dimensions(), "loaded indexed corpus");
        Ok(corpus)
    }
}
