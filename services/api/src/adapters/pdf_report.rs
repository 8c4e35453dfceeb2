//! services/api/src/adapters/pdf_report.rs
//!
//! The paginated document renderer. `report_blocks` turns `ReportData` into
//! logical blocks in a fixed section order, `pdf_layout` places them, and this
//! module draws the placed lines with `lopdf`. Output is uncompressed and has
//! no creation date, so identical input gives identical bytes.

use job_tracker_core::domain::{CountEntry, ReportConfiguration, ReportData};
use job_tracker_core::ports::{ExportFormat, PortError, PortResult, ReportRenderer};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use super::pdf_layout::{layout, stamp_page_numbers, wrap, Block, Line, Page, PageGeometry, TextStyle};

const TOP_N: usize = 10;
const SECTION_GAP: f32 = 18.0;
const INSIGHT_GAP: f32 = 12.0;
const LIST_INDENT: f32 = 12.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReportRenderer {
    geometry: PageGeometry,
}

impl PdfReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportRenderer for PdfReportRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, data: &ReportData, _config: &ReportConfiguration) -> PortResult<Vec<u8>> {
        let blocks = report_blocks(data, &self.geometry);
        let mut pages = layout(&blocks, &self.geometry);
        stamp_page_numbers(&mut pages, &self.geometry);
        write_pdf(&pages, &self.geometry)
    }
}

//=========================================================================================
// Sections
//=========================================================================================

/// Header, summary, status breakdown, top companies, top industries, insights.
/// Absent sections produce no block at all.
pub fn report_blocks(data: &ReportData, geometry: &PageGeometry) -> Vec<Block> {
    let mut blocks = Vec::new();

    blocks.push(
        Block::new(0.0)
            .line(Line::new(data.report_name.clone(), TextStyle::Title))
            .line(Line::new(
                format!("Generated: {}", data.generated_at.format("%Y-%m-%d %H:%M UTC")),
                TextStyle::Caption,
            ))
            .line(Line::new(format!("Date range: {}", data.date_range), TextStyle::Caption)),
    );

    let metrics = data.summary.present_metrics();
    if !metrics.is_empty() {
        blocks.push(
            Block::new(SECTION_GAP)
                .line(Line::new("Summary", TextStyle::Heading))
                .lines(metrics.into_iter().map(|(label, value)| {
                    Line::new(format!("{}: {}", label, value), TextStyle::Body).indented(LIST_INDENT)
                })),
        );
    }

    if !data.status_breakdown.is_empty() {
        blocks.push(
            Block::new(SECTION_GAP)
                .line(Line::new("Status Breakdown", TextStyle::Heading))
                .lines(data.status_breakdown.iter().map(|entry| {
                    Line::new(format!("{}: {}", entry.label, entry.count), TextStyle::Body)
                        .indented(LIST_INDENT)
                })),
        );
    }

    if let Some(block) = ranked_block("Top Companies", &data.company_breakdown) {
        blocks.push(block);
    }
    if let Some(block) = ranked_block("Top Industries", &data.industry_breakdown) {
        blocks.push(block);
    }

    for (index, insight) in data.insights().iter().enumerate() {
        let mut block = Block::new(if index == 0 { SECTION_GAP } else { INSIGHT_GAP });
        if index == 0 {
            block = block.line(Line::new("AI Insights", TextStyle::Heading));
        }
        let width = geometry.line_width(LIST_INDENT);
        block = block
            .line(Line::new(format!("{}. {}", index + 1, insight.title), TextStyle::Body))
            .lines(
                wrap(&insight.content, TextStyle::Body, width)
                    .into_iter()
                    .map(|text| Line::new(text, TextStyle::Body).indented(LIST_INDENT)),
            );
        blocks.push(block);
    }

    blocks
}

fn ranked_block(heading: &str, entries: &[CountEntry]) -> Option<Block> {
    if entries.is_empty() {
        return None;
    }
    Some(
        Block::new(SECTION_GAP)
            .line(Line::new(heading, TextStyle::Heading))
            .lines(entries.iter().take(TOP_N).enumerate().map(|(rank, entry)| {
                Line::new(format!("{}. {} ({})", rank + 1, entry.label, entry.count), TextStyle::Body)
                    .indented(LIST_INDENT)
            })),
    )
}

//=========================================================================================
// Drawing
//=========================================================================================

/// Standard Type1 fonts only understand single-byte text.
fn pdf_text(text: &str) -> Object {
    Object::String(win_ansi_bytes(text), StringFormat::Literal)
}

/// Encodes `text` for the WinAnsiEncoding fonts. Unmappable chars become `?`.
fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => c as u32 as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => b'?',
    }
}

fn page_operations(page: &Page) -> Vec<Operation> {
    let mut operations = Vec::with_capacity(page.lines.len() * 4);
    for line in &page.lines {
        let font = if line.style.is_bold() { "F2" } else { "F1" };
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec![font.into(), line.style.font_size().into()]));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new("Tj", vec![pdf_text(&line.text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    operations
}

fn write_pdf(pages: &[Page], geometry: &PageGeometry) -> PortResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content { operations: page_operations(page) };
        let encoded = content
            .encode()
            .map_err(|e| PortError::Unexpected(format!("failed to encode PDF content: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PortError::Unexpected(format!("failed to write PDF: {}", e)))?;
    Ok(bytes)
}
