//! Builds the bounded context string and image list for one question.

use std::collections::HashSet;

use tracing::debug;

use crate::config::RagConfig;
use crate::document::{ChunkKind, ScoredChunk};
use crate::metadata::MetadataStore;

/// The output of [`ContextAssembler::assemble`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    /// Text chunk contents joined by blank lines, truncated.
    pub text: String,
    /// Image file names, deduplicated, first-seen order.
    pub images: Vec<String>,
    /// Number of text chunks that went into `text`.
    pub text_chunk_count: usize,
}

impl AssembledContext {
    /// Whether any text chunk was retrieved.
    pub fn has_text(&self) -> bool {
        self.text_chunk_count > 0
    }
}

/// Merges retrieved chunks into generator input.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    pub fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.max_context_length)
    }

    /// Assemble the context for a set of retrieved chunks.
    ///
    /// When no image chunk was retrieved, every image record in `metadata`
    /// whose caption shares a word with the context is attached instead.
    /// Captions always contain their section heading, so this match is loose.
    pub fn assemble(&self, hits: &[ScoredChunk], metadata: &MetadataStore) -> AssembledContext {
        let texts: Vec<&str> =
            hits.iter().filter(|h| h.chunk.is_text()).map(|h| h.chunk.content.as_str()).collect();
        let text = truncate_chars(&texts.join("\n\n"), self.max_context_length);

        let mut images = Vec::new();
        let mut seen = HashSet::new();
        let mut retrieved_image = false;
        for hit in hits.iter().filter(|h| h.chunk.kind == ChunkKind::Image) {
            retrieved_image = true;
            if let Some(file) = &hit.chunk.image {
                if seen.insert(file.clone()) {
                    images.push(file.clone());
                }
            }
        }

        if !retrieved_image {
            let context_tokens = tokens(&text);
            for (caption, file) in metadata.image_records() {
                if tokens(caption).iter().any(|t| context_tokens.contains(t))
                    && seen.insert(file.to_string())
                {
                    images.push(file.to_string());
                }
            }
            debug!(image_count = images.len(), "attached images by caption overlap");
        }

        AssembledContext { text, images, text_chunk_count: texts.len() }
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Cut `text` to at most `max_chars` Unicode scalar values.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
