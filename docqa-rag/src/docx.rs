//! Minimal `.docx` reader.
//!
//! Reads `word/document.xml` in reading order and resolves paragraph styles
//! through `word/styles.xml` and embedded pictures through
//! `word/_rels/document.xml.rels`. Only the main document part is read;
//! headers, footers and comments are ignored. Paragraphs inside nested tables
//! are dropped, matching how cell text is usually read.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::document::{Block, SourceDocument};
use crate::error::{DocQaError, Result};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const DEFAULT_STYLE: &str = "Normal";

/// Read a `.docx` file from disk. The document id is the file name.
///
/// # Errors
///
/// Returns [`DocQaError::Document`] if the file is not a readable DOCX package.
pub fn read_docx(path: impl AsRef<Path>) -> Result<SourceDocument> {
    let path = path.as_ref();
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = File::open(path).map_err(|e| doc_error(&id, format!("cannot open: {e}")))?;
    parse_docx(id, BufReader::new(file))
}

/// Parse a DOCX package from any seekable reader.
///
/// # Errors
///
/// Returns [`DocQaError::Document`] if the package or its XML is malformed,
/// or if `word/document.xml` is missing.
pub fn parse_docx<R: Read + Seek>(id: impl Into<String>, reader: R) -> Result<SourceDocument> {
    let id = id.into();
    let mut archive = ZipArchive::new(reader).map_err(|e| doc_error(&id, e.to_string()))?;

    let document_xml = read_entry(&mut archive, DOCUMENT_PART)
        .map_err(|e| doc_error(&id, e.to_string()))?
        .ok_or_else(|| doc_error(&id, format!("missing {DOCUMENT_PART}")))?;
    let styles = match read_entry(&mut archive, STYLES_PART).map_err(|e| doc_error(&id, e.to_string()))? {
        Some(xml) => parse_styles(&xml).map_err(|e| doc_error(&id, e))?,
        None => StyleTable::default(),
    };
    let image_rels = match read_entry(&mut archive, RELS_PART).map_err(|e| doc_error(&id, e.to_string()))? {
        Some(xml) => parse_image_rels(&xml).map_err(|e| doc_error(&id, e))?,
        None => HashMap::new(),
    };

    let raw_blocks = parse_body(&document_xml, &styles).map_err(|e| doc_error(&id, e))?;

    let mut blocks = Vec::with_capacity(raw_blocks.len());
    for raw in raw_blocks {
        match raw {
            RawBlock::Ready(block) => blocks.push(block),
            RawBlock::ImageRef(rel_id) => {
                let Some(part) = image_rels.get(&rel_id) else {
                    debug!(document = %id, rel_id, "image relationship not found");
                    continue;
                };
                match read_entry(&mut archive, part).map_err(|e| doc_error(&id, e.to_string()))? {
                    Some(data) => {
                        let name = part.strip_prefix("word/").unwrap_or(part).to_string();
                        blocks.push(Block::Image { name, data });
                    }
                    None => debug!(document = %id, part, "image part missing from package"),
                }
            }
        }
    }

    Ok(SourceDocument { id, blocks })
}

fn doc_error(id: &str, message: impl Into<String>) -> DocQaError {
    DocQaError::Document { path: PathBuf::from(id), message: message.into() }
}

/// Upper bound on the buffer reserved from a zip entry's declared size.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<Option<Vec<u8>>, ZipError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let declared = usize::try_from(file.size()).unwrap_or(MAX_PREALLOC);
            let mut buf = Vec::with_capacity(declared.min(MAX_PREALLOC));
            file.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Paragraph style ids mapped to display names.
#[derive(Debug, Default)]
struct StyleTable {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleTable {
    fn resolve(&self, style_id: Option<&str>) -> String {
        match style_id {
            Some(id) => self.names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            None => self.default_paragraph.clone().unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        }
    }
}

/// Built-in style names are stored lowercase (`heading 1`); Word shows them
/// capitalized.
fn display_style_name(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if raw.starts_with("heading") || raw == "normal" || raw == "title" => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => raw.to_string(),
    }
}

fn parse_styles(xml: &[u8]) -> std::result::Result<StyleTable, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut table = StyleTable::default();
    // (style id, is paragraph style, is default)
    let mut current: Option<(String, bool, bool)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"style" => {
                    let id = attr(e, b"styleId").unwrap_or_default();
                    let is_paragraph = attr(e, b"type").as_deref() == Some("paragraph");
                    let is_default = matches!(attr(e, b"default").as_deref(), Some("1" | "true"));
                    current = Some((id, is_paragraph, is_default));
                }
                b"name" => {
                    if let (Some((id, true, is_default)), Some(name)) = (&current, attr(e, b"val")) {
                        let name = display_style_name(&name);
                        if *is_default {
                            table.default_paragraph = Some(name.clone());
                        }
                        table.names.insert(id.clone(), name);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"style" => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("styles XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(table)
}

/// Relationship ids of embedded images mapped to package part names.
fn parse_image_rels(xml: &[u8]) -> std::result::Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let is_image = attr(e, b"Type").is_some_and(|t| t.ends_with("/image"));
                let is_external = attr(e, b"TargetMode").as_deref() == Some("External");
                if let (true, false, Some(id), Some(target)) =
                    (is_image, is_external, attr(e, b"Id"), attr(e, b"Target"))
                {
                    rels.insert(id, resolve_part("word", &target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("relationships XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part(base: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

enum RawBlock {
    Ready(Block),
    ImageRef(String),
}

#[derive(Default)]
struct BodyState {
    blocks: Vec<RawBlock>,
    seen_images: HashSet<String>,
    table_depth: usize,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
    table_images: Vec<String>,
    in_paragraph: bool,
    in_run: bool,
    in_text: bool,
    text: String,
    style_id: Option<String>,
    paragraph_images: Vec<String>,
    /// Nesting depth inside `w:txbxContent` / `v:textbox`. Text box paragraphs
    /// are not part of the enclosing paragraph's text.
    txbx_depth: usize,
}

impl BodyState {
    fn start(&mut self, e: &BytesStart<'_>) {
        let local = e.local_name();
        if is_text_box(local.as_ref()) {
            self.txbx_depth += 1;
            return;
        }
        if self.txbx_depth > 0 {
            match local.as_ref() {
                b"blip" => self.note_image(attr(e, b"embed")),
                b"imagedata" => self.note_image(attr(e, b"id")),
                _ => {}
            }
            return;
        }
        match local.as_ref() {
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.row.clear(),
            b"tc" if self.table_depth == 1 => self.cell.clear(),
            b"p" => {
                self.in_paragraph = true;
                self.text.clear();
                self.style_id = None;
            }
            b"pStyle" if self.in_paragraph => self.style_id = attr(e, b"val"),
            b"r" => self.in_run = true,
            b"t" if self.in_run => self.in_text = true,
            b"tab" if self.in_run => self.text.push('\t'),
            b"br" | b"cr" if self.in_run => self.text.push('\n'),
            b"blip" => self.note_image(attr(e, b"embed")),
            b"imagedata" => self.note_image(attr(e, b"id")),
            _ => {}
        }
    }

    fn note_image(&mut self, rel_id: Option<String>) {
        if let Some(rel_id) = rel_id {
            if self.seen_images.insert(rel_id.clone()) {
                self.paragraph_images.push(rel_id);
            }
        }
    }

    fn end(&mut self, local: &[u8], styles: &StyleTable) {
        if is_text_box(local) {
            self.txbx_depth = self.txbx_depth.saturating_sub(1);
            return;
        }
        if self.txbx_depth > 0 {
            return;
        }
        match local {
            b"t" => self.in_text = false,
            b"r" => self.in_run = false,
            b"p" if self.in_paragraph => {
                self.in_paragraph = false;
                let text = std::mem::take(&mut self.text);
                let images = std::mem::take(&mut self.paragraph_images);
                match self.table_depth {
                    0 => {
                        let style = styles.resolve(self.style_id.as_deref());
                        self.blocks.push(RawBlock::Ready(Block::Paragraph { text, style }));
                        self.blocks.extend(images.into_iter().map(RawBlock::ImageRef));
                    }
                    1 => {
                        self.cell.push(text);
                        self.table_images.extend(images);
                    }
                    _ => self.table_images.extend(images),
                }
            }
            b"tc" if self.table_depth == 1 => {
                let cell = self.cell.join("\n");
                self.row.push(cell);
            }
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            b"tbl" if self.table_depth > 0 => {
                if self.table_depth == 1 {
                    let rows = std::mem::take(&mut self.rows);
                    self.blocks.push(RawBlock::Ready(Block::Table { rows }));
                    let images = std::mem::take(&mut self.table_images);
                    self.blocks.extend(images.into_iter().map(RawBlock::ImageRef));
                }
                self.table_depth -= 1;
            }
            _ => {}
        }
    }
}

fn is_text_box(local: &[u8]) -> bool {
    matches!(local, b"txbxContent" | b"textbox")
}

fn parse_body(xml: &[u8], styles: &StyleTable) -> std::result::Result<Vec<RawBlock>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut state = BodyState::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => state.start(e),
            Ok(Event::Empty(ref e)) => {
                state.start(e);
                state.end(e.local_name().as_ref(), styles);
            }
            Ok(Event::End(ref e)) => state.end(e.local_name().as_ref(), styles),
            Ok(Event::Text(ref e)) if state.in_text => {
                let text = e.unescape().map_err(|e| format!("document XML text error: {e}"))?;
                state.text.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("document XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(state.blocks)
}
