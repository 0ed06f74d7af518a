//! PDF report export.
//!
//! Builds an A4 report with lopdf: title, generation date, the summary and a
//! grid table (label column plus one column per policy). Text is set in the
//! base-14 Helvetica fonts with WinAnsi encoding, so characters outside that
//! code page are transliterated first and anything left over becomes `?`.
//!
//! Coordinates are tracked top-down in points and flipped when emitted.

use crate::config::ResponseLanguage;
use crate::error::PolicyCompareError;
use crate::pipeline::contract::ComparisonResult;
use crate::present::{comparison_rows, header_row, wrap_measured, FieldLabels, ListStyle};
use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

const MM: f32 = 72.0 / 25.4;
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 14.0 * MM;
const SUMMARY_WIDTH: f32 = 180.0 * MM;
const LABEL_COLUMN: f32 = 30.0 * MM;

const CELL_FONT_SIZE: f32 = 9.0;
const CELL_PADDING: f32 = 1.8 * MM;
const LINE_FACTOR: f32 = 1.2;

const HEADER_FILL: (f32, f32, f32) = (59.0 / 255.0, 130.0 / 255.0, 246.0 / 255.0);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);
const TEXT: (f32, f32, f32) = (0.1, 0.1, 0.1);
const GRID: (f32, f32, f32) = (0.78, 0.78, 0.78);

/// Report settings.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub language: ResponseLanguage,
    /// Printed as `dd.mm.yyyy`.
    pub generated_on: NaiveDate,
}

impl ReportOptions {
    /// Options dated today (local time).
    pub fn new(language: ResponseLanguage) -> Self {
        Self {
            language,
            generated_on: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = date;
        self
    }

    fn title(&self) -> &'static str {
        match self.language {
            ResponseLanguage::Turkish => "Sigorta Karşılaştırma Raporu",
            ResponseLanguage::English => "Insurance Comparison Report",
        }
    }

    fn date_line(&self) -> String {
        let date = self.generated_on.format("%d.%m.%Y");
        match self.language {
            ResponseLanguage::Turkish => format!("Oluşturulma Tarihi: {date}"),
            ResponseLanguage::English => format!("Generated: {date}"),
        }
    }
}

/// Replace Turkish letters the report font cannot show with ASCII.
pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ç' => 'c',
            'ğ' => 'g',
            'ı' => 'i',
            'ö' => 'o',
            'ş' => 's',
            'ü' => 'u',
            'Ç' => 'C',
            'Ğ' => 'G',
            'İ' => 'I',
            'Ö' => 'O',
            'Ş' => 'S',
            'Ü' => 'U',
            other => other,
        })
        .collect()
}

/// Render the comparison report.
pub fn render_report(
    result: &ComparisonResult,
    options: &ReportOptions,
) -> Result<Vec<u8>, PolicyCompareError> {
    let labels = FieldLabels::report(options.language);
    let mut canvas = Canvas::new();

    canvas.text(MARGIN, 20.0 * MM, 18.0, Font::Bold, TEXT, &transliterate(options.title()));
    canvas.text(MARGIN, 28.0 * MM, 10.0, Font::Regular, TEXT, &transliterate(&options.date_line()));
    canvas.text(MARGIN, 38.0 * MM, 12.0, Font::Bold, TEXT, &transliterate(labels.summary));

    let summary_size = 10.0;
    let mut y = 44.0 * MM;
    for line in wrap_measured(&transliterate(&result.summary), SUMMARY_WIDTH, |s| {
        text_width(s, summary_size, Font::Regular)
    }) {
        if y + summary_size > PAGE_HEIGHT - MARGIN {
            canvas.new_page();
            y = MARGIN;
        }
        canvas.text(MARGIN, y, summary_size, Font::Regular, TEXT, &line);
        y += summary_size * LINE_FACTOR;
    }
    canvas.y = y + 6.0 * MM;

    let header: Vec<String> = header_row(result, &labels).iter().map(|h| transliterate(h)).collect();
    let rows: Vec<Vec<String>> = comparison_rows(result, &labels, ListStyle::Report)
        .into_iter()
        .map(|r| {
            std::iter::once(r.label)
                .chain(r.cells)
                .map(|c| transliterate(&c))
                .collect()
        })
        .collect();

    let table = Table::new(result.policies.len(), header);
    table.draw_header(&mut canvas);
    for row in &rows {
        table.draw_row(&mut canvas, row);
    }

    let pages = canvas.finish();
    debug!("Report laid out on {} pages", pages.len());
    assemble(pages)
}

// ── Layout ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

struct Canvas {
    finished: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    /// Distance from the top edge of the next free line.
    y: f32,
}

impl Canvas {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            current: Vec::new(),
            y: MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.finished.push(std::mem::take(&mut self.current));
        self.y = MARGIN;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.finished.push(self.current);
        self.finished
    }

    fn bottom(&self) -> f32 {
        PAGE_HEIGHT - MARGIN
    }

    /// Draw one line of text whose top edge sits at `top`.
    fn text(&mut self, x: f32, top: f32, size: f32, font: Font, color: (f32, f32, f32), s: &str) {
        let baseline = PAGE_HEIGHT - top - size * 0.8;
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
            Operation::new("Tf", vec![font.resource().into(), size.into()]),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(win_ansi(s), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn fill_rect(&mut self, x: f32, top: f32, w: f32, h: f32, color: (f32, f32, f32)) {
        self.current.extend([
            Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
            Operation::new("re", vec![x.into(), (PAGE_HEIGHT - top - h).into(), w.into(), h.into()]),
            Operation::new("f", vec![]),
        ]);
    }

    fn stroke_rect(&mut self, x: f32, top: f32, w: f32, h: f32) {
        self.current.extend([
            Operation::new("w", vec![0.5_f32.into()]),
            Operation::new("RG", vec![GRID.0.into(), GRID.1.into(), GRID.2.into()]),
            Operation::new("re", vec![x.into(), (PAGE_HEIGHT - top - h).into(), w.into(), h.into()]),
            Operation::new("S", vec![]),
        ]);
    }
}

struct Table {
    widths: Vec<f32>,
    header: Vec<String>,
}

impl Table {
    fn new(policy_count: usize, header: Vec<String>) -> Self {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let mut widths = vec![LABEL_COLUMN];
        if policy_count > 0 {
            let each = (usable - LABEL_COLUMN) / policy_count as f32;
            widths.extend(std::iter::repeat(each).take(policy_count));
        }
        Self { widths, header }
    }

    fn line_height() -> f32 {
        CELL_FONT_SIZE * LINE_FACTOR
    }

    fn wrap(&self, cells: &[String], header: bool) -> Vec<Vec<String>> {
        cells
            .iter()
            .zip(&self.widths)
            .enumerate()
            .map(|(col, (cell, width))| {
                let font = cell_font(header, col);
                wrap_measured(cell, width - 2.0 * CELL_PADDING, |s| {
                    text_width(s, CELL_FONT_SIZE, font)
                })
            })
            .collect()
    }

    fn draw_header(&self, canvas: &mut Canvas) {
        let wrapped = self.wrap(&self.header, true);
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        if canvas.y + lines as f32 * Self::line_height() + 2.0 * CELL_PADDING > canvas.bottom() {
            canvas.new_page();
        }
        self.draw_chunk(canvas, &wrapped, 0, lines, true);
    }

    /// Draw one body row. A row that does not fit moves to the next page;
    /// a row taller than a whole page is split across pages.
    fn draw_row(&self, canvas: &mut Canvas, cells: &[String]) {
        let wrapped = self.wrap(cells, false);
        let total = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let fresh_capacity = self.capacity(MARGIN + self.header_height(), canvas.bottom());

        let mut start = 0;
        let mut fresh_page = false;
        while start < total {
            let remaining = total - start;
            let mut fits = self.capacity(canvas.y, canvas.bottom());
            if fresh_page {
                fits = fits.max(1);
            }
            let move_whole = start == 0 && remaining > fits && remaining <= fresh_capacity;
            if fits == 0 || (move_whole && !fresh_page) {
                canvas.new_page();
                self.draw_header(canvas);
                fresh_page = true;
                continue;
            }
            let take = remaining.min(fits);
            self.draw_chunk(canvas, &wrapped, start, take, false);
            start += take;
            if start < total {
                canvas.new_page();
                self.draw_header(canvas);
                fresh_page = true;
            }
        }
    }

    fn header_height(&self) -> f32 {
        let lines = self.wrap(&self.header, true).iter().map(Vec::len).max().unwrap_or(1);
        lines.max(1) as f32 * Self::line_height() + 2.0 * CELL_PADDING
    }

    /// Text lines that fit between `top` and `bottom`.
    fn capacity(&self, top: f32, bottom: f32) -> usize {
        let room = bottom - top - 2.0 * CELL_PADDING;
        if room <= 0.0 {
            0
        } else {
            (room / Self::line_height()).floor() as usize
        }
    }

    fn draw_chunk(
        &self,
        canvas: &mut Canvas,
        wrapped: &[Vec<String>],
        start: usize,
        lines: usize,
        header: bool,
    ) {
        let height = lines as f32 * Self::line_height() + 2.0 * CELL_PADDING;
        let top = canvas.y;
        let mut x = MARGIN;

        for (col, (cell_lines, width)) in wrapped.iter().zip(&self.widths).enumerate() {
            if header {
                canvas.fill_rect(x, top, *width, height, HEADER_FILL);
            }
            canvas.stroke_rect(x, top, *width, height);

            let color = if header { WHITE } else { TEXT };
            let font = cell_font(header, col);
            for (i, line) in cell_lines.iter().skip(start).take(lines).enumerate() {
                if line.is_empty() {
                    continue;
                }
                let line_top = top + CELL_PADDING + i as f32 * Self::line_height();
                canvas.text(x + CELL_PADDING, line_top, CELL_FONT_SIZE, font, color, line);
            }
            x += width;
        }
        canvas.y = top + height;
    }
}

fn cell_font(header: bool, col: usize) -> Font {
    if header || col == 0 {
        Font::Bold
    } else {
        Font::Regular
    }
}

// ── Fonts and encoding ───────────────────────────────────────────────────

/// Approximate rendered width in points using Helvetica metrics.
fn text_width(s: &str, size: f32, font: Font) -> f32 {
    let units: u32 = s.chars().map(glyph_width).sum();
    let scale = if font == Font::Bold { 1.06 } else { 1.0 };
    units as f32 * size / 1000.0 * scale
}

// Helvetica advance widths for U+0020..=U+007E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

fn glyph_width(c: char) -> u32 {
    match c {
        ' '..='~' => HELVETICA_ASCII[c as usize - 0x20] as u32,
        '•' => 350,
        _ => 556,
    }
}

/// Encode text for a WinAnsiEncoding font.
pub fn win_ansi(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' '..='~' => out.push(c as u8),
            '\t' => out.push(b' '),
            '•' => out.push(0x95),
            '€' => out.push(0x80),
            '…' => out.push(0x85),
            '‘' => out.push(0x91),
            '’' => out.push(0x92),
            '“' => out.push(0x93),
            '”' => out.push(0x94),
            '–' => out.push(0x96),
            '—' => out.push(0x97),
            '₺' => out.extend_from_slice(b"TL"),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

// ── Document assembly ────────────────────────────────────────────────────

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, PolicyCompareError> {
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
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular,
            Font::Bold.resource() => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }.encode().map_err(export_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(export_err)?;
    Ok(out)
}

fn export_err(e: impl std::fmt::Display) -> PolicyCompareError {
    PolicyCompareError::ExportFailed {
        format: "pdf",
        detail: e.to_string(),
    }
}
