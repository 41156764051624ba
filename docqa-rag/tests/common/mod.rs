//! Shared test doubles and fixtures.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use docqa_rag::{
    AnswerGenerator, DocQaError, EmbeddingProvider, GenerationRequest, OcrEngine, Result,
};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Words the test embedder knows; every other token is ignored.
const VOCABULARY: &[&str] = &[
    "password", "reset", "settings", "click", "email", "account", "login", "invoice", "billing",
    "monthly", "printer", "floor", "weather", "server", "database", "backup", "diagram", "figure",
    "flowchart", "architecture", "illustration",
];

/// Deterministic bag-of-words embedding over [`VOCABULARY`].
pub struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let token = token.to_lowercase();
            if let Some(axis) = VOCABULARY.iter().position(|w| *w == token) {
                vector[axis] += 1.0;
            }
        }
        Ok(vector)
    }

    fn name(&self) -> &str {
        "bag-of-words"
    }
}

/// OCR double that returns the same text for every image.
pub struct FixedOcr(pub &'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// OCR double that always fails.
pub struct FailingOcr;

#[async_trait]
impl OcrEngine for FailingOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String> {
        Err(DocQaError::Ocr("engine unavailable".into()))
    }
}

/// Generator double that records requests and echoes a fixed answer.
pub struct RecordingGenerator {
    pub answer: &'static str,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    pub fn new(answer: &'static str) -> Self {
        Self { answer, requests: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.answer.to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// A solid-color PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn heading(text: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#)
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// A paragraph holding the image with relationship id `rel_id`.
pub fn picture(rel_id: &str) -> String {
    format!(r#"<w:p><w:r><w:drawing><a:blip r:embed="{rel_id}"/></w:drawing></w:r></w:p>"#)
}

pub fn table(rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|c| format!("<w:tc><w:p><w:r><w:t>{c}</w:t></w:r></w:p></w:tc>"))
                .collect();
            format!("<w:tr>{cells}</w:tr>")
        })
        .collect();
    format!("<w:tbl>{rows}</w:tbl>")
}

/// Package a body fragment and its images (`rel_id`, PNG bytes) as a `.docx`.
pub fn docx(body: &[String], images: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
            xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<w:body>{}</w:body>
</w:document>"#,
        body.concat()
    );
    let styles = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
</w:styles>"#;
    let relationships: String = images
        .iter()
        .map(|(id, _)| {
            format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{id}.png"/>"#
            )
        })
        .collect();
    let rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut entries: Vec<(String, Vec<u8>)> = vec![
        ("word/document.xml".into(), document.into_bytes()),
        ("word/styles.xml".into(), styles.as_bytes().to_vec()),
        ("word/_rels/document.xml.rels".into(), rels.into_bytes()),
    ];
    for (id, data) in images {
        entries.push((format!("word/media/{id}.png"), data.clone()));
    }
    for (name, data) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(&data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
