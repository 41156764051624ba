//! Query-time retrieval: embed, search, threshold, resolve.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RagConfig;
use crate::corpus::IndexedCorpus;
use crate::document::ScoredChunk;
use crate::embedding::NormalizingEmbedder;
use crate::error::Result;
use crate::index::Neighbor;
use crate::metadata::MetadataStore;

/// Resolve index hits against the metadata store.
///
/// Hits scoring below `threshold`, hits outside the store, and records
/// without usable content or type are dropped. The order of `neighbors` is
/// kept.
pub fn select_hits(
    neighbors: &[Neighbor],
    metadata: &MetadataStore,
    threshold: f32,
) -> Vec<ScoredChunk> {
    neighbors
        .iter()
        .filter(|n| n.score >= threshold)
        .filter_map(|n| match metadata.chunk(n.position) {
            Some(chunk) => Some(ScoredChunk { chunk, score: n.score, position: n.position }),
            None => {
                debug!(position = n.position, "dropping hit without usable metadata");
                None
            }
        })
        .collect()
}

/// Finds the chunks most similar to a question.
pub struct Retriever {
    corpus: Arc<IndexedCorpus>,
    embedder: NormalizingEmbedder,
    top_k: usize,
    similarity_threshold: f32,
}

impl Retriever {
    pub fn new(corpus: Arc<IndexedCorpus>, embedder: NormalizingEmbedder, config: &RagConfig) -> Self {
        Self {
            corpus,
            embedder,
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
        }
    }

    pub fn corpus(&self) -> &Arc<IndexedCorpus> {
        &self.corpus
    }

    /// Retrieve up to the configured `top_k` chunks, best first.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        self.retrieve_top(query, self.top_k).await
    }

    /// Retrieve up to `k` chunks, best first.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn retrieve_top(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embedder.embed_query(query).await?;
        let neighbors = self.corpus.index().search(&query_vector, k)?;
        let hits = select_hits(&neighbors, self.corpus.metadata(), self.similarity_threshold);

        info!(
            candidate_count = neighbors.len(),
            result_count = hits.len(),
            threshold = self.similarity_threshold,
            "retrieval completed"
        );
        Ok(hits)
    }
}
