//! Offline index construction: discover, extract, embed, index.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::RagConfig;
use crate::corpus::IndexedCorpus;
use crate::document::{Chunk, ChunkKind, SourceDocument};
use crate::docx::parse_docx;
use crate::embedding::NormalizingEmbedder;
use crate::error::{DocQaError, Result};
use crate::extractor::{ChunkExtractor, ImageStore};
use crate::index::VectorIndex;
use crate::metadata::MetadataStore;
use crate::ocr::OcrEngine;

/// List the `.docx` files directly inside `dir`, sorted by path.
///
/// Word lock files (`~$name.docx`) are skipped.
///
/// # Errors
///
/// Returns [`DocQaError::BuildInput`] if `dir` is not a directory or holds no
/// documents.
pub fn discover_documents(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DocQaError::BuildInput(format!(
            "document directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
        })
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with("~$"))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(DocQaError::BuildInput(format!("no .docx files found in {}", dir.display())));
    }
    files.sort();
    Ok(files)
}

/// Counts describing a finished build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Documents that were read successfully.
    pub documents: usize,
    pub text_chunks: usize,
    pub image_chunks: usize,
}

impl BuildReport {
    pub fn total_chunks(&self) -> usize {
        self.text_chunks + self.image_chunks
    }
}

/// Runs a full, from-scratch index build.
pub struct IndexBuilder {
    extractor: ChunkExtractor,
    embedder: NormalizingEmbedder,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(
        config: RagConfig,
        ocr: Arc<dyn OcrEngine>,
        images: ImageStore,
        embedder: NormalizingEmbedder,
    ) -> Self {
        let batch_size = config.embed_batch_size.max(1);
        Self { extractor: ChunkExtractor::new(config, ocr, images), embedder, batch_size }
    }

    /// Build from every document in `dir`.
    ///
    /// # Errors
    ///
    /// See [`discover_documents`] and [`build_from_paths`](Self::build_from_paths).
    pub async fn build_from_dir(&self, dir: impl AsRef<Path>) -> Result<(IndexedCorpus, BuildReport)> {
        let paths = discover_documents(dir)?;
        self.build_from_paths(&paths).await
    }

    /// Build from the given files, in the given order. Files that cannot be
    /// parsed are logged and skipped.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub async fn build_from_paths(&self, paths: &[PathBuf]) -> Result<(IndexedCorpus, BuildReport)> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            match read_document(path).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        self.build(&documents).await
    }

    /// Extract, embed and index `documents`.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::BuildInput`] if no document yields a chunk, and
    /// propagates embedding, index and image-write failures.
    pub async fn build(&self, documents: &[SourceDocument]) -> Result<(IndexedCorpus, BuildReport)> {
        let mut chunks: Vec<Chunk> = Vec::new();
        for document in documents {
            chunks.extend(self.extractor.extract(document).await?);
        }
        if chunks.is_empty() {
            return Err(DocQaError::BuildInput(
                "no document produced any indexable content".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embedded = self.embedder.embed_documents(&texts).await.map_err(|e| {
                error!(error = %e, "embedding failed during build");
                e
            })?;
            vectors.extend(embedded);
        }

        let index = VectorIndex::build(&vectors)?;
        let corpus = IndexedCorpus::new(index, MetadataStore::from_chunks(&chunks))?;

        let image_chunks = chunks.iter().filter(|c| c.kind == ChunkKind::Image).count();
        let report = BuildReport {
            documents: documents.len(),
            text_chunks: chunks.len() - image_chunks,
            image_chunks,
        };
        info!(
            documents = report.documents,
            text_chunks = report.text_chunks,
            image_chunks = report.image_chunks,
            dimensions = corpus.index().dimensions(),
            "index build completed"
        );
        Ok((corpus, report))
    }
}

async fn read_document(path: &Path) -> Result<SourceDocument> {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = tokio::fs::read(path).await.map_err(|e| DocQaError::Document {
        path: path.to_path_buf(),
        message: format!("cannot read: {e}"),
    })?;
    parse_docx(id, Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn discovers_only_top_level_docx_files_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.docx"), "").unwrap();
        fs::write(root.join("A.DOCX"), "").unwrap();
        fs::write(root.join("~$b.docx"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::write(root.join("nested/c.docx"), "").unwrap();

        let files = discover_documents(root).unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["A.DOCX", "b.docx"]);
    }

    #[test]
    fn empty_or_missing_directory_is_build_input_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(discover_documents(temp.path()), Err(DocQaError::BuildInput(_))));
        assert!(matches!(
            discover_documents(temp.path().join("missing")),
            Err(DocQaError::BuildInput(_))
        ));
    }
}
