//! Positional metadata store, aligned with the vector index.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Chunk, ChunkKind};
use crate::error::{DocQaError, Result};

/// A persisted chunk entry.
///
/// Every field is optional so that a store with a few damaged entries still
/// loads; [`MetadataRecord::to_chunk`] decides whether an entry is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<ChunkKind>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source_doc: Option<String>,
}

impl MetadataRecord {
    /// The chunk this record describes, or `None` if `content` or `type` is
    /// missing or the content is empty.
    pub fn to_chunk(&self) -> Option<Chunk> {
        let content = self.content.as_deref().filter(|c| !c.is_empty())?;
        let kind = self.kind?;
        Some(Chunk {
            content: content.to_string(),
            kind,
            image: self.image.clone(),
            source_doc: self.source_doc.clone().unwrap_or_default(),
        })
    }
}

impl From<&Chunk> for MetadataRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            content: Some(chunk.content.clone()),
            kind: Some(chunk.kind),
            image: chunk.image.clone(),
            source_doc: Some(chunk.source_doc.clone()),
        }
    }
}

/// Ordered chunk records; record `i` describes vector `i` of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    /// Build a store from chunks, keeping their order.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self { records: chunks.iter().map(MetadataRecord::from).collect() }
    }

    /// Build a store from raw records.
    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw record at `position`.
    pub fn record(&self, position: usize) -> Option<&MetadataRecord> {
        self.records.get(position)
    }

    /// The usable chunk at `position`, if any.
    pub fn chunk(&self, position: usize) -> Option<Chunk> {
        self.record(position).and_then(MetadataRecord::to_chunk)
    }

    /// All records in positional order.
    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// Image records that carry a file name, in positional order.
    pub fn image_records(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().filter_map(|r| match (r.kind, &r.content, &r.image) {
            (Some(ChunkKind::Image), Some(caption), Some(image)) => {
                Some((caption.as_str(), image.as_str()))
            }
            _ => None,
        })
    }

    /// Write the store to `path` as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Io`] or [`DocQaError::Serialization`] on failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.records)
            .map_err(|e| DocQaError::Serialization(format!("{}: {e}", path.display())))?;
        writer.flush()?;
        debug!(path = %path.display(), records = self.len(), "saved metadata store");
        Ok(())
    }

    /// Read a store previously written with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::IndexMissing`] if the file does not exist and
    /// [`DocQaError::Serialization`] if it is not a JSON array of records.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DocQaError::IndexMissing { path: path.to_path_buf() });
        }
        let reader = BufReader::new(File::open(path)?);
        let records: Vec<MetadataRecord> = serde_json::from_reader(reader)
            .map_err(|e| DocQaError::Serialization(format!("{}: {e}", path.display())))?;
        Ok(Self { records })
    }
}
