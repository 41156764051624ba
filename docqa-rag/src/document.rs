//! Data types for source documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A parsed source document, its body flattened into reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Identifier of the document, normally its file name.
    pub id: String,
    /// Body blocks in the order they appear in the document.
    pub blocks: Vec<Block>,
}

/// One element of a document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A paragraph and the display name of its style (e.g. `Heading 1`).
    Paragraph {
        /// The paragraph text.
        text: String,
        /// The paragraph style name; `Normal` when unstyled.
        style: String,
    },
    /// A table as rows of cell texts.
    Table {
        /// Rows of cell texts.
        rows: Vec<Vec<String>>,
    },
    /// An embedded image blob, placed right after the block referencing it.
    Image {
        /// The blob's name inside the document package.
        name: String,
        /// The raw encoded image bytes.
        data: Vec<u8>,
    },
}

impl Block {
    /// Convenience constructor for a paragraph block.
    pub fn paragraph(text: impl Into<String>, style: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into(), style: style.into() }
    }
}

/// Whether a chunk came from text or from a captioned image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Paragraph or table text.
    Text,
    /// A diagram, represented by its synthetic caption.
    Image,
}

/// The atomic retrievable unit.
///
/// Chunks built through [`Chunk::text`] and [`Chunk::image`] always carry
/// non-empty content, and `image` is `Some` exactly when `kind` is
/// [`ChunkKind::Image`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The embedded text: paragraph/table text or an image caption.
    pub content: String,
    /// The chunk type.
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// File name of the saved image, for image chunks.
    pub image: Option<String>,
    /// Identifier of the originating document.
    pub source_doc: String,
}

impl Chunk {
    /// Create a text chunk.
    pub fn text(content: impl Into<String>, source_doc: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: ChunkKind::Text,
            image: None,
            source_doc: source_doc.into(),
        }
    }

    /// Create an image chunk from its caption and saved file name.
    pub fn image(
        caption: impl Into<String>,
        file_name: impl Into<String>,
        source_doc: impl Into<String>,
    ) -> Self {
        Self {
            content: caption.into(),
            kind: ChunkKind::Image,
            image: Some(file_name.into()),
            source_doc: source_doc.into(),
        }
    }

    /// Returns `true` for text chunks.
    pub fn is_text(&self) -> bool {
        self.kind == ChunkKind::Text
    }
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
    /// Position of the chunk in the metadata store.
    pub position: usize,
}
