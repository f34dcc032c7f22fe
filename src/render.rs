use crate::catalog::DocumentType;
use crate::config::Letterhead;
use crate::error::Result;
use crate::form::SubmissionValues;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use lopdf::{
    Dictionary, Document, Object, ObjectId, Stream, StringFormat,
    content::{Content, Operation},
    dictionary,
};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

mod winansi;

use winansi::text_width;

// US Letter, in points
const PAGE_WIDTH_PT: f32 = 612.0;
const PAGE_HEIGHT_PT: f32 = 792.0;
const PAGE_MARGIN: f32 = 72.0;
const MAX_LINE_WIDTH: f32 = PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN;

const FONT_SIZE_TITLE: f32 = 24.0;
const FONT_SIZE_HEADING: f32 = 16.0;
const FONT_SIZE_FIELD: f32 = 12.0;
const FONT_SIZE_NORMAL: f32 = 10.0;
const LINE_HEIGHT_FACTOR: f32 = 1.3;

const FONT_NORMAL: &str = "F1";
const FONT_BOLD: &str = "F2";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    Subheading(String),
    Field { label: String, value: String },
    Timestamp(NaiveDateTime),
}

impl Block {
    pub fn text(&self) -> String {
        match self {
            Block::Title(t) | Block::Subheading(t) => t.clone(),
            Block::Field { label, value } => format!("{}: {}", label, value),
            Block::Timestamp(at) => format!("Generated on: {}", at.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// A finished document: content blocks plus the file name it should get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub blocks: Vec<Block>,
    /// Preferred location. `write_pdf` adds a `_N` suffix if it is taken.
    pub path: PathBuf,
}

/// Lays out title, letterhead, one line per catalog field and the generation
/// time. Values missing from `values` render as empty; extra keys are ignored.
pub fn render_document(
    letterhead: &Letterhead,
    document: &DocumentType,
    values: &SubmissionValues,
    generated_at: NaiveDateTime,
    output_dir: &Path,
) -> RenderedDocument {
    let mut blocks = Vec::with_capacity(document.fields.len() + 4);
    blocks.push(Block::Title(letterhead.title.clone()));
    blocks.push(Block::Subheading(letterhead.subtitle.clone()));
    blocks.push(Block::Subheading(document.title.clone()));
    blocks.extend(document.fields.iter().map(|field| Block::Field {
        label: field.label.clone(),
        value: values.value_for(&field.name).to_string(),
    }));
    blocks.push(Block::Timestamp(generated_at));

    RenderedDocument {
        blocks,
        path: output_dir.join(format!(
            "{}_{}.pdf",
            file_stem_for(&document.title),
            generated_at.format(FILE_TIMESTAMP_FORMAT)
        )),
    }
}

/// `base` for `n == 0`, otherwise `Visa_Application_20240501_101500_<n>.pdf`.
fn numbered_path(base: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}_{}.pdf", stem, n))
}

/// Claims the first free name among `base`, `base_1`, `base_2`, ...
/// `create_new` makes the claim atomic, so concurrent writers never share a file.
fn create_unique(base: &Path) -> Result<(PathBuf, File)> {
    let mut n = 0;
    loop {
        let path = numbered_path(base, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

fn save_into(doc: &mut Document, file: File) -> Result<()> {
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

fn file_stem_for(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

#[derive(Debug)]
struct Run {
    text: String,
    bold: bool,
}

#[derive(Debug)]
struct TextLine {
    runs: Vec<Run>,
    size: f32,
    is_centered: bool,
    space_after: f32,
}

impl RenderedDocument {
    pub fn lines(&self) -> Vec<String> {
        self.blocks.iter().map(Block::text).collect()
    }

    /// Writes the PDF and returns where it landed. An existing file is never
    /// overwritten.
    pub fn write_pdf(&self) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut doc = self.to_pdf()?;
        let (path, file) = create_unique(&self.path)?;
        if let Err(e) = save_into(&mut doc, file) {
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!("Could not remove partial file {}: {}", path.display(), cleanup);
            }
            return Err(e);
        }
        info!("Document written to {}", path.display());
        Ok(path)
    }

    pub fn to_pdf(&self) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let info_id = doc.add_object(dictionary! {
            "Creator" => Object::string_literal("poa_forms"),
        });
        doc.trailer.set("Info", info_id);
        let pages_id = doc.new_object_id();

        let mut writer = PageWriter::new(pages_id);
        for (idx, line) in self.layout().iter().enumerate() {
            let line_height = line.size * LINE_HEIGHT_FACTOR;
            if writer.current_y - line_height < PAGE_MARGIN && !writer.operations.is_empty() {
                debug!("Page break before line {}", idx);
                writer.finish_page(&mut doc)?;
            }
            writer.write_line(line);
            writer.current_y -= line.space_after;
        }
        writer.finish_page(&mut doc)?;

        let count = writer.page_ids.len() as i64;
        let kids: Vec<Object> = writer.page_ids.into_iter().map(Object::Reference).collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    fn layout(&self) -> Vec<TextLine> {
        let mut lines: Vec<TextLine> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Title(text) => lines.extend(wrapped(text, FONT_SIZE_TITLE, true, true, 30.0)),
                Block::Subheading(text) => {
                    lines.extend(wrapped(text, FONT_SIZE_HEADING, true, false, 20.0))
                }
                Block::Field { label, .. } => {
                    // Bold the "Label:" prefix when it fits on the first line.
                    let prefix = format!("{}:", label);
                    let measure = |line: &str| match line.strip_prefix(prefix.as_str()) {
                        Some(rest) => {
                            text_width(&prefix, FONT_SIZE_FIELD, true)
                                + text_width(rest, FONT_SIZE_FIELD, false)
                        }
                        None => text_width(line, FONT_SIZE_FIELD, false),
                    };
                    let pieces = wrap_text(&block.text(), MAX_LINE_WIDTH, measure);
                    let mut field_lines = text_lines(pieces, FONT_SIZE_FIELD, false, false, 10.0);
                    if let Some(first) = field_lines.first_mut() {
                        let rest = first.runs[0].text.strip_prefix(prefix.as_str()).map(str::to_string);
                        if let Some(rest) = rest {
                            first.runs = vec![
                                Run { text: prefix, bold: true },
                                Run { text: rest, bold: false },
                            ];
                        }
                    }
                    lines.extend(field_lines);
                }
                Block::Timestamp(_) => {
                    if let Some(last) = lines.last_mut() {
                        last.space_after += 30.0;
                    }
                    lines.extend(wrapped(&block.text(), FONT_SIZE_NORMAL, false, false, 0.0));
                }
            }
        }
        lines
    }
}

fn wrapped(text: &str, size: f32, bold: bool, is_centered: bool, space_after: f32) -> Vec<TextLine> {
    let pieces = wrap_text(text, MAX_LINE_WIDTH, |line| text_width(line, size, bold));
    text_lines(pieces, size, bold, is_centered, space_after)
}

fn text_lines(
    pieces: Vec<String>,
    size: f32,
    bold: bool,
    is_centered: bool,
    space_after: f32,
) -> Vec<TextLine> {
    let last = pieces.len().saturating_sub(1);
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| TextLine {
            runs: vec![Run { text: piece, bold }],
            size,
            is_centered,
            space_after: if i == last { space_after } else { 0.0 },
        })
        .collect()
}

/// Greedy word wrap to `max_width` points as measured by `width_of`. Words
/// wider than a whole line are split hard; an empty input still yields one
/// (empty) line.
fn wrap_text(text: &str, max_width: f32, width_of: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while width_of(&word) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(split_point(&word, max_width, &width_of));
            lines.push(word);
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let candidate = if current.is_empty() {
            word.clone()
        } else {
            format!("{} {}", current, word)
        };
        if width_of(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Byte index of the longest prefix of `word` that fits, never less than one char.
fn split_point(word: &str, max_width: f32, width_of: &impl Fn(&str) -> f32) -> usize {
    let mut end = word.chars().next().map_or(0, char::len_utf8);
    for (idx, c) in word.char_indices().skip(1) {
        let next = idx + c.len_utf8();
        if width_of(&word[..next]) > max_width {
            break;
        }
        end = next;
    }
    end
}

struct PageWriter {
    pages_id: ObjectId,
    operations: Vec<Operation>,
    current_y: f32,
    page_ids: Vec<ObjectId>,
}

impl PageWriter {
    fn new(pages_id: ObjectId) -> Self {
        Self {
            pages_id,
            operations: Vec::new(),
            current_y: PAGE_HEIGHT_PT - PAGE_MARGIN,
            page_ids: Vec::new(),
        }
    }

    fn write_line(&mut self, line: &TextLine) {
        let line_height = line.size * LINE_HEIGHT_FACTOR;
        if line_height > PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN {
            warn!("Line of size {} is taller than the printable area", line.size);
        }
        self.current_y -= line_height;

        let mut x_pos = PAGE_MARGIN;
        if line.is_centered {
            let width: f32 = line
                .runs
                .iter()
                .map(|r| text_width(&r.text, line.size, r.bold))
                .sum();
            x_pos = ((PAGE_WIDTH_PT - width) / 2.0).max(PAGE_MARGIN);
        }

        self.operations.push(Operation::new("BT", vec![]));
        self.operations
            .push(Operation::new("Td", vec![x_pos.into(), self.current_y.into()]));
        for run in &line.runs {
            let font = if run.bold { FONT_BOLD } else { FONT_NORMAL };
            self.operations
                .push(Operation::new("Tf", vec![font.into(), line.size.into()]));
            self.operations.push(Operation::new(
                "Tj",
                vec![Object::String(winansi::encode(&run.text), StringFormat::Literal)],
            ));
        }
        self.operations.push(Operation::new("ET", vec![]));
    }

    /// Flushes pending operations into a new page. A document always gets at
    /// least one page, even when empty.
    fn finish_page(&mut self, doc: &mut Document) -> Result<()> {
        if self.operations.is_empty() && !self.page_ids.is_empty() {
            return Ok(());
        }
        let content = Content {
            operations: std::mem::take(&mut self.operations),
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let font = |base: &str| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base.to_string(),
                "Encoding" => "WinAnsiEncoding",
            }
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    FONT_NORMAL => font("Helvetica"),
                    FONT_BOLD => font("Helvetica-Bold"),
                },
            },
            "MediaBox" => vec![0.0.into(), 0.0.into(), PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into()],
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        self.current_y = PAGE_HEIGHT_PT - PAGE_MARGIN;
        Ok(())
    }
}
