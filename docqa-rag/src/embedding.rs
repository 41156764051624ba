//! Embedding provider trait and the normalizing wrapper used by every
//! read and write path.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DocQaError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// A short name for log and error messages.
    fn name(&self) -> &str;
}

/// Euclidean length of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector in place to unit length. Zero vectors are left unchanged.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Wraps an [`EmbeddingProvider`] so that every vector it hands out is
/// L2-normalized. Inner products between its outputs are cosine similarities.
#[derive(Clone)]
pub struct NormalizingEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl NormalizingEmbedder {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Embedding`] if the provider fails or returns an
    /// empty vector.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.provider.embed(text).await?;
        self.finish(vector)
    }

    /// Embed a batch of chunk texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Embedding`] if the provider fails, returns the
    /// wrong number of vectors, or returns an empty vector.
    pub async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = self.provider.name(), batch_size = texts.len(), "embedding batch");

        let vectors = self.provider.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(DocQaError::Embedding {
                provider: self.provider.name().to_string(),
                message: format!(
                    "requested {} embeddings but received {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }
        vectors.into_iter().map(|v| self.finish(v)).collect()
    }

    fn finish(&self, mut vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.is_empty() {
            return Err(DocQaError::Embedding {
                provider: self.provider.name().to_string(),
                message: "provider returned an empty vector".into(),
            });
        }
        normalize_l2(&mut vector);
        Ok(vector)
    }
}
