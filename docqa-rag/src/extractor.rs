//! Turns parsed documents into text and image chunks.
//!
//! Extraction runs in two passes. A synchronous fold walks the blocks in
//! reading order, carrying the current section heading as its accumulator,
//! and yields finished text chunks plus image candidates stamped with the
//! heading in effect where they appear. The async pass then decodes, filters,
//! OCRs and saves each image candidate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::document::{Block, Chunk, SourceDocument};
use crate::error::{DocQaError, Result};
use crate::ocr::OcrEngine;

/// Directory that receives the PNG copies of indexed images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn save(&self, file_name: &str, image: &DynamicImage) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        image
            .to_rgba8()
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| DocQaError::Io(std::io::Error::other(format!("{}: {e}", path.display()))))
    }
}

/// File name for the `ordinal`-th indexed image of a document.
///
/// The slug keeps names readable; the hash of the full document id keeps
/// documents whose slugs coincide apart.
pub fn image_file_name(doc_id: &str, ordinal: usize) -> String {
    let stem = Path::new(doc_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(doc_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    format!("{}-{}-{ordinal}.png", slugify(&stem), &hash[..12])
}

fn slugify(value: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c == ' ' || c == '-' || c == '_' {
            out.push('-');
        }
    }
    if out.is_empty() { "doc".to_string() } else { out }
}

/// Heading detection follows Word's built-in naming: `Heading 1`, `Heading 2`, ...
pub fn is_heading_style(style: &str) -> bool {
    style.trim().to_ascii_lowercase().starts_with("heading")
}

enum Planned<'a> {
    Ready(Chunk),
    Image { heading: String, name: &'a str, data: &'a [u8] },
}

/// Produces the ordered chunks of a document.
pub struct ChunkExtractor {
    config: RagConfig,
    ocr: Arc<dyn OcrEngine>,
    images: ImageStore,
}

impl ChunkExtractor {
    pub fn new(config: RagConfig, ocr: Arc<dyn OcrEngine>, images: ImageStore) -> Self {
        Self { config, ocr, images }
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    /// Extract the chunks of one document, in reading order.
    ///
    /// OCR failures and undecodable images only drop the affected image.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Io`] if an accepted image cannot be written to
    /// the image directory.
    pub async fn extract(&self, document: &SourceDocument) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut saved_images = 0;

        for planned in self.plan(document) {
            match planned {
                Planned::Ready(chunk) => chunks.push(chunk),
                Planned::Image { heading, name, data } => {
                    if let Some(chunk) =
                        self.image_chunk(&document.id, &heading, name, data, saved_images).await?
                    {
                        saved_images += 1;
                        chunks.push(chunk);
                    }
                }
            }
        }

        info!(
            document = %document.id,
            chunk_count = chunks.len(),
            image_count = saved_images,
            "extracted document"
        );
        Ok(chunks)
    }

    fn plan<'a>(&self, document: &'a SourceDocument) -> Vec<Planned<'a>> {
        let source = document.id.as_str();
        let (_, planned) = document.blocks.iter().fold(
            (self.config.default_heading.clone(), Vec::new()),
            |(heading, mut planned), block| match block {
                Block::Paragraph { text, style } => {
                    let text = text.trim();
                    if text.is_empty() {
                        (heading, planned)
                    } else if is_heading_style(style) {
                        (text.to_string(), planned)
                    } else {
                        planned.push(Planned::Ready(Chunk::text(format!("{heading}\n{text}"), source)));
                        (heading, planned)
                    }
                }
                Block::Table { rows } => {
                    if let Some(content) = self.table_content(&heading, rows) {
                        planned.push(Planned::Ready(Chunk::text(content, source)));
                    }
                    (heading, planned)
                }
                Block::Image { name, data } => {
                    planned.push(Planned::Image { heading: heading.clone(), name, data });
                    (heading, planned)
                }
            },
        );
        planned
    }

    fn table_content(&self, heading: &str, rows: &[Vec<String>]) -> Option<String> {
        let lines: Vec<String> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.trim())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
                    .join(&self.config.table_cell_delimiter)
            })
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() { None } else { Some(format!("{heading}\n{}", lines.join("\n"))) }
    }

    async fn image_chunk(
        &self,
        doc_id: &str,
        heading: &str,
        name: &str,
        data: &[u8],
        ordinal: usize,
    ) -> Result<Option<Chunk>> {
        let decoded = match image::load_from_memory(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(document = doc_id, image = name, error = %e, "skipping undecodable image");
                return Ok(None);
            }
        };

        let (width, height) = decoded.dimensions();
        let min = self.config.min_image_dimension;
        if width < min || height < min {
            debug!(document = doc_id, image = name, width, height, "skipping small image");
            return Ok(None);
        }

        let ocr_text = match self.ocr.recognize(data).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(document = doc_id, image = name, error = %e, "ocr failed, treating as empty");
                String::new()
            }
        };
        if ocr_text.chars().count() < self.config.min_ocr_chars {
            debug!(document = doc_id, image = name, "skipping image without readable text");
            return Ok(None);
        }

        let file_name = image_file_name(doc_id, ordinal);
        if let Err(e) = self.images.save(&file_name, &decoded) {
            warn!(document = doc_id, image = name, file = %file_name, error = %e, "could not save image, skipping");
            return Ok(None);
        }

        let caption = format!("{heading} {} {ocr_text}", self.config.image_caption_keywords);
        debug!(document = doc_id, image = name, file = %file_name, "indexed image");
        Ok(Some(Chunk::image(caption, file_name, doc_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_styles_are_detected_case_insensitively() {
        assert!(is_heading_style("Heading 1"));
        assert!(is_heading_style("heading 3"));
        assert!(!is_heading_style("Normal"));
        assert!(!is_heading_style("Title"));
    }

    #[test]
    fn image_names_are_stable_and_distinct_per_document() {
        let a = image_file_name("User Guide.docx", 0);
        assert_eq!(a, image_file_name("User Guide.docx", 0));
        assert!(a.starts_with("user-guide-"));
        assert!(a.ends_with("-0.png"));
        assert_ne!(a, image_file_name("User_Guide.docx", 0));
        assert_ne!(a, image_file_name("User Guide.docx", 1));
    }

    #[test]
    fn slug_falls_back_for_symbol_only_names() {
        assert_eq!(slugify("%%%"), "doc");
    }
}
