//! Retrieval pipeline for question answering over `.docx` documents.
//!
//! This crate provides:
//! - DOCX parsing into ordered paragraph, table and image blocks
//! - Heading-aware chunk extraction with OCR-captioned diagrams
//! - Normalized embeddings and a flat inner-product vector index
//! - Thresholded retrieval and bounded context assembly
//! - A question-answering service over a persisted index
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{CorpusPaths, DocumentQa, IndexedCorpus, NormalizingEmbedder, RagConfig};
//! use docqa_rag::ollama::{OllamaChatGenerator, OllamaEmbeddingProvider};
//!
//! let corpus = Arc::new(IndexedCorpus::load(&CorpusPaths::in_dir("index"))?);
//! let embedder = NormalizingEmbedder::new(Arc::new(OllamaEmbeddingProvider::from_env()));
//! let qa = DocumentQa::new(corpus, embedder, Arc::new(OllamaChatGenerator::from_env()), &RagConfig::default());
//! let response = qa.ask("How do I reset my password?").await;
//! ```

pub mod config;
pub mod context;
pub mod corpus;
pub mod document;
pub mod docx;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod index;
pub mod indexer;
pub mod metadata;
pub mod ocr;
pub mod qa;
pub mod retriever;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use config::{RagConfig, RagConfigBuilder};
pub use context::{AssembledContext, ContextAssembler};
pub use corpus::{CorpusPaths, IndexedCorpus};
pub use document::{Block, Chunk, ChunkKind, ScoredChunk, SourceDocument};
pub use docx::{parse_docx, read_docx};
pub use embedding::{EmbeddingProvider, NormalizingEmbedder};
pub use error::{DocQaError, Result};
pub use extractor::{ChunkExtractor, ImageStore};
pub use generator::{AnswerGenerator, GenerationRequest};
pub use index::{Neighbor, VectorIndex};
pub use indexer::{BuildReport, IndexBuilder, discover_documents};
pub use metadata::{MetadataRecord, MetadataStore};
pub use ocr::{OcrEngine, TesseractOcr};
pub use qa::{AnswerOutcome, DocumentQa, QaResponse};
pub use retriever::Retriever;
