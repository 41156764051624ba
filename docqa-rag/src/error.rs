//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying a document index.
#[derive(Debug, Error)]
pub enum DocQaError {
    /// No usable source documents, or no document produced any chunk.
    #[error("Build input error: {0}")]
    BuildInput(String),

    /// A persisted index artifact is missing.
    #[error("Index artifact not found at {}; run `docqa build` first", path.display())]
    IndexMissing {
        /// The path that was expected to exist.
        path: PathBuf,
    },

    /// The vector index and the metadata store disagree in length.
    #[error("Corpus mismatch: index holds {vectors} vectors but metadata holds {records} records")]
    CorpusMismatch {
        /// Number of vectors in the index.
        vectors: usize,
        /// Number of metadata records.
        records: usize,
    },

    /// A source document could not be read or parsed.
    #[error("Document error ({}): {message}", path.display())]
    Document {
        /// The document that failed.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Optical character recognition failed.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected an operation.
    #[error("Vector index error: {0}")]
    Index(String),

    /// The answer generator failed.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generator backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encoding or decoding of a persisted artifact failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for docqa operations.
pub type Result<T> = std::result::Result<T, DocQaError>;
