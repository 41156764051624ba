//! Configuration for extraction, retrieval and answer generation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocQaError, Result};

/// Tunable parameters shared by the index builder and the query path.
///
/// The image and OCR thresholds were tuned empirically against real
/// documents; they live here so they can be adjusted without a rebuild of
/// the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of candidates requested from the vector index.
    pub top_k: usize,
    /// Minimum cosine similarity for a candidate to be kept.
    pub similarity_threshold: f32,
    /// Hard cap, in characters, on the assembled context.
    pub max_context_length: usize,
    /// Images narrower or shorter than this many pixels are ignored.
    pub min_image_dimension: u32,
    /// Images whose OCR text is shorter than this are ignored.
    pub min_ocr_chars: usize,
    /// Heading used for content that precedes the first heading.
    pub default_heading: String,
    /// Separator placed between the cells of a table row.
    pub table_cell_delimiter: String,
    /// Keywords injected into every image caption.
    pub image_caption_keywords: String,
    /// Number of chunk texts sent to the embedding provider per call.
    pub embed_batch_size: usize,
    /// Upper bound on a single answer-generation call.
    pub generation_timeout_secs: u64,
    /// URL prefix under which saved images are served.
    pub image_url_prefix: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 12,
            similarity_threshold: 0.30,
            max_context_length: 3000,
            min_image_dimension: 200,
            min_ocr_chars: 5,
            default_heading: "General".to_string(),
            table_cell_delimiter: " | ".to_string(),
            image_caption_keywords: "diagram figure flowchart architecture illustration"
                .to_string(),
            embed_batch_size: 32,
            generation_timeout_secs: 60,
            image_url_prefix: "/static/images/".to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Config`] if the file cannot be parsed or fails
    /// validation, and [`DocQaError::Io`] if it cannot be read.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: RagConfig = serde_json::from_str(&raw).map_err(|e| {
            DocQaError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The answer-generation timeout as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Check that all parameters are within their valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Config`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` is outside `[-1.0, 1.0]`
    /// - `max_context_length == 0`
    /// - `embed_batch_size == 0`
    /// - `generation_timeout_secs == 0`
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(DocQaError::Config("top_k must be greater than zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DocQaError::Config(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                self.similarity_threshold
            )));
        }
        if self.max_context_length == 0 {
            return Err(DocQaError::Config(
                "max_context_length must be greater than zero".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(DocQaError::Config(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(DocQaError::Config(
                "generation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of candidates requested from the vector index.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the maximum context length in characters.
    pub fn max_context_length(mut self, length: usize) -> Self {
        self.config.max_context_length = length;
        self
    }

    /// Set the minimum pixel width and height for indexed images.
    pub fn min_image_dimension(mut self, pixels: u32) -> Self {
        self.config.min_image_dimension = pixels;
        self
    }

    /// Set the minimum number of OCR characters for indexed images.
    pub fn min_ocr_chars(mut self, chars: usize) -> Self {
        self.config.min_ocr_chars = chars;
        self
    }

    /// Set the heading used before the first heading paragraph.
    pub fn default_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.default_heading = heading.into();
        self
    }

    /// Set the number of texts per embedding call during builds.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the answer-generation timeout in seconds.
    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    /// Set the URL prefix for served images.
    pub fn image_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_url_prefix = prefix.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
