//! Frame-based pagination of an assembled document.
//!
//! Elements flow top to bottom through frames: one per page, or two side
//! by side in the two-column template. Layout only decides positions; the
//! order of elements is never changed.

use crate::fonts::{encode, Face};
use image::imageops::FilterType;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use textbook_core::{
    fit_within, Alignment, Diagnostics, Document, Element, Figure, StyleRole, TableBlock, TextStyle,
    Warning,
};

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 72.0;

/// Space between a list label and the item text.
const LABEL_GAP: f32 = 4.0;
const CELL_PADDING: f32 = 4.0;
const TABLE_FONT_SIZE: f32 = 10.0;
const HEADER_GRAY: f32 = 0.85;
const GRID_LINE_WIDTH: f32 = 0.5;
/// Embedded rasters are downsampled past this density.
const MAX_PIXELS_PER_POINT: f32 = 3.0;

/// One drawing instruction in page coordinates (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        face: Face,
        size: f32,
        x: f32,
        y: f32,
        bytes: Vec<u8>,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        gray: f32,
    },
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
    },
    Image {
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

/// Decoded figure pixels, alpha already flattened onto white.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// The result of laying out a document.
#[derive(Debug, Clone, Default)]
pub struct LaidOut {
    pub pages: Vec<Page>,
    pub images: Vec<RasterImage>,
}

impl LaidOut {
    /// Every face used by a text operation.
    pub fn faces(&self) -> Vec<Face> {
        let mut faces: Vec<Face> = self
            .pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter_map(|op| match op {
                DrawOp::Text { face, .. } => Some(*face),
                _ => None,
            })
            .collect();
        faces.sort();
        faces.dedup();
        faces
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    x: f32,
    width: f32,
}

/// Paginate `document`. Figures that fail to load are skipped with a
/// render warning.
pub fn layout(document: &Document, diag: &mut Diagnostics) -> LaidOut {
    let mut layouter = Layouter::new(document);
    for placed in document.elements() {
        let unit = placed.unit.unwrap_or(0);
        match &placed.element {
            Element::Text { role, text, label } => layouter.text(*role, text, label.as_deref()),
            Element::Table(table) => layouter.table(table),
            Element::Preformatted { lines } => layouter.preformatted(lines),
            Element::Figure(figure) => layouter.figure(unit, figure, diag),
            Element::Spacer { height } => layouter.spacer(*height),
            Element::PageBreak => layouter.page_break(),
        }
    }
    layouter.finish()
}

struct Layouter<'a> {
    document: &'a Document,
    pages: Vec<Page>,
    images: Vec<RasterImage>,
    loaded: HashMap<PathBuf, usize>,
    column: usize,
    cursor: f32,
    frame_has_content: bool,
}

impl<'a> Layouter<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            pages: vec![Page::default()],
            images: Vec::new(),
            loaded: HashMap::new(),
            column: 0,
            cursor: PAGE_HEIGHT - MARGIN,
            frame_has_content: false,
        }
    }

    fn frame(&self) -> Frame {
        let content = PAGE_WIDTH - 2.0 * MARGIN;
        let template = self.document.template;
        if template.two_column {
            let width = (content - template.gutter) / 2.0;
            Frame {
                x: MARGIN + self.column as f32 * (width + template.gutter),
                width,
            }
        } else {
            Frame {
                x: MARGIN,
                width: content,
            }
        }
    }

    fn frame_height() -> f32 {
        PAGE_HEIGHT - 2.0 * MARGIN
    }

    fn remaining(&self) -> f32 {
        self.cursor - MARGIN
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.column = 0;
        self.cursor = PAGE_HEIGHT - MARGIN;
        self.frame_has_content = false;
    }

    fn next_frame(&mut self) {
        if self.document.template.two_column && self.column == 0 {
            self.column = 1;
            self.cursor = PAGE_HEIGHT - MARGIN;
            self.frame_has_content = false;
        } else {
            self.new_page();
        }
    }

    /// Move on when `height` does not fit. An empty frame always accepts.
    fn ensure(&mut self, height: f32) {
        if self.frame_has_content && height > self.remaining() {
            self.next_frame();
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
        self.frame_has_content = true;
    }

    fn space_before(&mut self, amount: f32) {
        if self.frame_has_content {
            self.cursor -= amount;
        }
    }

    fn style(&self, role: StyleRole) -> TextStyle {
        *self.document.style.get(role)
    }

    fn text(&mut self, role: StyleRole, text: &str, label: Option<&str>) {
        let style = self.style(role);
        let face = Face::for_style(&style);
        let available = (self.frame().width - style.left_indent).max(style.size);
        let lines = wrap_text(face, style.size, text, available);

        self.space_before(style.space_before);
        for (i, line) in lines.iter().enumerate() {
            self.ensure(style.leading);
            let frame = self.frame();
            let baseline = self.cursor - style.size;
            let offset = match style.alignment {
                Alignment::Left => 0.0,
                Alignment::Center => ((available - face.measure(line, style.size)) / 2.0).max(0.0),
            };
            self.push(DrawOp::Text {
                face,
                size: style.size,
                x: frame.x + style.left_indent + offset,
                y: baseline,
                bytes: line.clone(),
            });

            if let (0, Some(label)) = (i, label) {
                let label = encode(label);
                let width = face.measure(&label, style.size);
                let x = (frame.x + style.left_indent - width - LABEL_GAP).max(frame.x);
                self.push(DrawOp::Text {
                    face,
                    size: style.size,
                    x,
                    y: baseline,
                    bytes: label,
                });
            }
            self.cursor -= style.leading;
        }
        self.cursor -= style.space_after;
    }

    fn table(&mut self, table: &TableBlock) {
        let body = self.style(StyleRole::Body);
        let size = body.size.min(TABLE_FONT_SIZE);
        let leading = size * 1.2;
        let face = Face::for_style(&body);
        let columns = table.column_count().max(1);
        let column_width = self.frame().width / columns as f32;
        let max_lines = (((Self::frame_height() - 2.0 * CELL_PADDING) / leading).floor() as usize).max(1);

        self.space_before(body.space_after);
        for (r, row) in table.rows.iter().enumerate() {
            let header = r == 0;
            let row_face = if header { face.bold() } else { face };
            let cells: Vec<Vec<Vec<u8>>> = (0..columns)
                .map(|c| {
                    let text = row.get(c).map_or("", String::as_str);
                    wrap_text(row_face, size, text, column_width - 2.0 * CELL_PADDING)
                })
                .collect();
            let mut line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            if line_count > max_lines {
                log::debug!("table row {} truncated to {} lines", r, max_lines);
                line_count = max_lines;
            }
            let row_height = line_count as f32 * leading + 2.0 * CELL_PADDING;

            self.ensure(row_height);
            let frame = self.frame();
            let top = self.cursor;
            if header {
                self.push(DrawOp::FillRect {
                    x: frame.x,
                    y: top - row_height,
                    width: column_width * columns as f32,
                    height: row_height,
                    gray: HEADER_GRAY,
                });
            }
            for (c, cell) in cells.into_iter().enumerate() {
                let x = frame.x + c as f32 * column_width;
                self.push(DrawOp::StrokeRect {
                    x,
                    y: top - row_height,
                    width: column_width,
                    height: row_height,
                    line_width: GRID_LINE_WIDTH,
                });
                for (l, line) in cell.into_iter().take(line_count).enumerate() {
                    self.push(DrawOp::Text {
                        face: row_face,
                        size,
                        x: x + CELL_PADDING,
                        y: top - CELL_PADDING - size - l as f32 * leading,
                        bytes: line,
                    });
                }
            }
            self.cursor -= row_height;
        }
        self.cursor -= body.space_after;
    }

    /// Code lines keep their spacing; a line wider than the frame is cut
    /// at the last character that fits and continues on the next line.
    fn preformatted(&mut self, lines: &[String]) {
        let style = self.style(StyleRole::Code);
        let face = Face::for_style(&style);
        let available = self.frame().width - style.left_indent;

        self.space_before(style.space_before);
        for line in lines {
            for piece in hard_wrap(face, style.size, &encode(line), available) {
                self.ensure(style.leading);
                let frame = self.frame();
                if !piece.is_empty() {
                    self.push(DrawOp::Text {
                        face,
                        size: style.size,
                        x: frame.x + style.left_indent,
                        y: self.cursor - style.size,
                        bytes: piece,
                    });
                }
                self.frame_has_content = true;
                self.cursor -= style.leading;
            }
        }
        self.cursor -= style.space_after;
    }

    fn figure(&mut self, unit: usize, figure: &Figure, diag: &mut Diagnostics) {
        let caption = self.style(StyleRole::Caption);
        let caption_height = caption.space_before + caption.leading;
        let frame = self.frame();
        let (width, height) = fit_within(
            figure.width,
            figure.height,
            frame.width,
            (Self::frame_height() - caption_height).max(1.0),
        );

        let index = match self.load_image(figure, width, height) {
            Ok(index) => index,
            Err(detail) => {
                diag.warn(Warning::Render {
                    unit,
                    image: figure.ordinal,
                    detail,
                });
                return;
            }
        };

        self.ensure(height + caption_height);
        let frame = self.frame();
        self.push(DrawOp::Image {
            index,
            x: frame.x + (frame.width - width) / 2.0,
            y: self.cursor - height,
            width,
            height,
        });
        self.cursor -= height;
        self.text(StyleRole::Caption, &figure.caption, None);
    }

    fn load_image(&mut self, figure: &Figure, width: f32, height: f32) -> Result<usize, String> {
        if let Some(&index) = self.loaded.get(&figure.path) {
            return Ok(index);
        }

        let bytes = std::fs::read(&figure.path)
            .map_err(|e| format!("cannot read {}: {}", figure.path.display(), e))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| format!("{:?} payload does not decode: {}", figure.format, e))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err("image has no pixels".to_string());
        }

        let raster = flatten(downsample(decoded, width, height));
        let index = self.images.len();
        self.images.push(raster);
        self.loaded.insert(figure.path.clone(), index);
        Ok(index)
    }

    fn spacer(&mut self, height: f32) {
        if !self.frame_has_content {
            return;
        }
        if height >= self.remaining() {
            self.next_frame();
        } else {
            self.cursor -= height;
        }
    }

    /// Breaks on a page that has nothing on it yet collapse.
    fn page_break(&mut self) {
        let empty = self.pages.last().map_or(true, |p| p.ops.is_empty());
        if !empty {
            self.new_page();
        }
    }

    fn finish(mut self) -> LaidOut {
        if self.pages.len() > 1 && self.pages.last().is_some_and(|p| p.ops.is_empty()) {
            self.pages.pop();
        }
        LaidOut {
            pages: self.pages,
            images: self.images,
        }
    }
}

fn downsample(image: DynamicImage, width: f32, height: f32) -> DynamicImage {
    let max_width = (width * MAX_PIXELS_PER_POINT).ceil().max(1.0) as u32;
    let max_height = (height * MAX_PIXELS_PER_POINT).ceil().max(1.0) as u32;
    if image.width() > max_width || image.height() > max_height {
        image.resize(max_width, max_height, FilterType::Triangle)
    } else {
        image
    }
}

/// Composite onto white and drop the alpha channel.
fn flatten(image: DynamicImage) -> RasterImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let rgb = rgba
        .pixels()
        .flat_map(|px| {
            let [r, g, b, a] = px.0;
            let a = u16::from(a);
            let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8;
            [blend(r), blend(g), blend(b)]
        })
        .collect();
    RasterImage { width, height, rgb }
}

/// Greedy word wrap into encoded lines. Words wider than `width` are
/// split between characters. Embedded newlines force a break.
pub fn wrap_text(face: Face, size: f32, text: &str, width: f32) -> Vec<Vec<u8>> {
    let space = face.measure(b" ", size);
    let mut lines = Vec::new();

    for hard_line in text.split('\n') {
        let mut current: Vec<u8> = Vec::new();
        let mut current_width = 0.0;

        for word in hard_line.split_whitespace() {
            let encoded = encode(word);
            let word_width = face.measure(&encoded, size);

            if !current.is_empty() && current_width + space + word_width <= width {
                current.push(b' ');
                current.extend_from_slice(&encoded);
                current_width += space + word_width;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if word_width <= width {
                current = encoded;
                current_width = word_width;
            } else {
                let mut pieces = hard_wrap(face, size, &encoded, width);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                current_width = face.measure(&last, size);
                current = last;
            }
        }

        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Split encoded text at character boundaries so each piece fits `width`.
/// Every piece holds at least one character.
fn hard_wrap(face: Face, size: f32, encoded: &[u8], width: f32) -> Vec<Vec<u8>> {
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    let mut current_width = 0.0;

    for &code in encoded {
        let glyph = f32::from(face.glyph_width(code)) * size / 1000.0;
        if !current.is_empty() && current_width + glyph > width {
            pieces.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        current.push(code);
        current_width += glyph;
    }
    pieces.push(current);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use textbook_core::{
        Assembler, ConvertConfig, ImageAsset, ImageFormat, LayoutBlock, ListMarker, ParsedUnit,
        StyleSheet,
    };

    fn assemble(units: Vec<ParsedUnit>, config: &ConvertConfig) -> Document {
        let mut diag = Diagnostics::new();
        Assembler::new(StyleSheet::from_config(config), config)
            .assemble(&units, &mut diag)
            .unwrap()
    }

    fn text_unit(number: usize, blocks: Vec<LayoutBlock>) -> ParsedUnit {
        ParsedUnit {
            number,
            blocks,
            images: Vec::new(),
        }
    }

    fn page_texts(page: &Page) -> Vec<String> {
        page.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { bytes, .. } => Some(String::from_utf8_lossy(bytes).to_string()),
                _ => None,
            })
            .collect()
    }

    fn write_png(dir: &std::path::Path, name: &str, width: u32, height: u32, alpha: u8) -> ImageAsset {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, alpha]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        let path = dir.join(name);
        std::fs::write(&path, out.get_ref()).unwrap();
        ImageAsset {
            path,
            format: ImageFormat::Png,
            width,
            height,
            byte_len: out.get_ref().len(),
            unit: 1,
            ordinal: 0,
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let lines = wrap_text(Face::Courier, 10.0, text, 120.0);
        // 120pt of 6pt glyphs holds 20 characters
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 20, "{:?}", String::from_utf8_lossy(line));
        }
        let rejoined: Vec<String> = lines.iter().map(|l| String::from_utf8_lossy(l).to_string()).collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_oversize_word_and_keeps_newlines() {
        let lines = wrap_text(Face::Courier, 10.0, "abcdefghij\nxy", 30.0);
        let lines: Vec<&[u8]> = lines.iter().map(Vec::as_slice).collect();
        assert_eq!(lines, vec![&b"abcde"[..], b"fghij", b"xy"]);
    }

    #[test]
    fn test_wrap_empty_text_is_one_empty_line() {
        assert_eq!(wrap_text(Face::Helvetica, 11.0, "", 100.0), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_units_start_new_pages() {
        let config = ConvertConfig::default();
        let doc = assemble(
            vec![
                text_unit(1, vec![LayoutBlock::Paragraph("First".into())]),
                text_unit(2, vec![LayoutBlock::Paragraph("Second".into())]),
            ],
            &config,
        );
        let mut diag = Diagnostics::new();
        let laid = layout(&doc, &mut diag);
        assert_eq!(laid.pages.len(), 2);
        assert_eq!(page_texts(&laid.pages[0]), vec!["First"]);
        assert_eq!(page_texts(&laid.pages[1]), vec!["Second"]);
    }

    #[test]
    fn test_blank_unit_does_not_leave_empty_page() {
        let config = ConvertConfig::default();
        let doc = assemble(
            vec![
                text_unit(1, vec![LayoutBlock::Paragraph("Before".into())]),
                text_unit(2, vec![]),
                text_unit(3, vec![LayoutBlock::Paragraph("After".into())]),
            ],
            &config,
        );
        let laid = layout(&doc, &mut Diagnostics::new());
        assert_eq!(laid.pages.len(), 2);
        assert!(laid.pages.iter().all(|p| !p.ops.is_empty()));
    }

    #[test]
    fn test_long_text_overflows_to_next_page() {
        let config = ConvertConfig::default();
        let blocks = (0..200)
            .map(|i| LayoutBlock::Paragraph(format!("Paragraph number {}", i)))
            .collect();
        let doc = assemble(vec![text_unit(1, blocks)], &config);
        let laid = layout(&doc, &mut Diagnostics::new());
        assert!(laid.pages.len() > 1);

        let all: Vec<String> = laid.pages.iter().flat_map(page_texts).collect();
        let expected: Vec<String> = (0..200).map(|i| format!("Paragraph number {}", i)).collect();
        assert_eq!(all, expected);

        for page in &laid.pages {
            for op in &page.ops {
                if let DrawOp::Text { y, .. } = op {
                    assert!(*y >= MARGIN - 3.0 && *y <= PAGE_HEIGHT - MARGIN);
                }
            }
        }
    }

    #[test]
    fn test_two_column_fills_left_then_right() {
        let config = ConvertConfig::default().with_two_column(true);
        let blocks = (0..120)
            .map(|i| LayoutBlock::Paragraph(format!("Line {}", i)))
            .collect();
        let doc = assemble(vec![text_unit(1, blocks)], &config);
        let laid = layout(&doc, &mut Diagnostics::new());

        let xs: Vec<f32> = laid.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, .. } => Some(*x),
                _ => None,
            })
            .collect();
        let column_width = (PAGE_WIDTH - 2.0 * MARGIN - doc.template.gutter) / 2.0;
        let right = MARGIN + column_width + doc.template.gutter;
        assert_eq!(xs[0], MARGIN);
        assert!(xs.iter().any(|&x| (x - right).abs() < 1e-3));
        // left column is filled before the right one starts
        let first_right = xs.iter().position(|&x| (x - right).abs() < 1e-3).unwrap();
        assert!(xs[..first_right].iter().all(|&x| x == MARGIN));

        let all: Vec<String> = laid.pages.iter().flat_map(page_texts).collect();
        assert_eq!(all.len(), 120);
        assert_eq!(all[119], "Line 119");
    }

    #[test]
    fn test_list_label_drawn_in_indent() {
        let config = ConvertConfig::default();
        let doc = assemble(
            vec![text_unit(
                1,
                vec![LayoutBlock::ListItem {
                    marker: ListMarker::Ordinal("3.".into()),
                    text: "Third".into(),
                }],
            )],
            &config,
        );
        let laid = layout(&doc, &mut Diagnostics::new());
        let texts: Vec<(String, f32)> = laid.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { bytes, x, .. } => Some((String::from_utf8_lossy(bytes).to_string(), *x)),
                _ => None,
            })
            .collect();
        assert_eq!(texts[0].0, "Third");
        assert_eq!(texts[1].0, "3.");
        assert!(texts[1].1 < texts[0].1);
    }

    #[test]
    fn test_table_header_is_shaded() {
        let config = ConvertConfig::default();
        let table = TableBlock {
            rows: vec![
                vec!["Name".into(), "Value".into()],
                vec!["a".into(), "1".into()],
                vec!["b".into(), "2".into()],
            ],
        };
        let doc = assemble(vec![text_unit(1, vec![LayoutBlock::Table(table)])], &config);
        let laid = layout(&doc, &mut Diagnostics::new());
        let ops = &laid.pages[0].ops;

        let fills = ops.iter().filter(|op| matches!(op, DrawOp::FillRect { .. })).count();
        let strokes = ops.iter().filter(|op| matches!(op, DrawOp::StrokeRect { .. })).count();
        assert_eq!(fills, 1);
        assert_eq!(strokes, 6);

        let header_face = ops.iter().find_map(|op| match op {
            DrawOp::Text { face, bytes, .. } if bytes == b"Name" => Some(*face),
            _ => None,
        });
        assert_eq!(header_face, Some(Face::TimesBold));
        assert_eq!(page_texts(&laid.pages[0]), vec!["Name", "Value", "a", "1", "b", "2"]);
    }

    #[test]
    fn test_preformatted_keeps_lines_and_indentation() {
        let config = ConvertConfig::default();
        let doc = assemble(
            vec![text_unit(
                1,
                vec![LayoutBlock::CodeBlock {
                    lines: vec!["fn main() {".into(), "    run();".into(), "}".into()],
                }],
            )],
            &config,
        );
        let laid = layout(&doc, &mut Diagnostics::new());
        assert_eq!(page_texts(&laid.pages[0]), vec!["fn main() {", "    run();", "}"]);
        assert!(laid.pages[0].ops.iter().all(|op| matches!(
            op,
            DrawOp::Text {
                face: Face::Courier,
                ..
            }
        )));
    }

    #[test]
    fn test_figure_is_placed_with_caption_and_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig::default();
        let mut unit = text_unit(1, vec![LayoutBlock::Paragraph("Look".into())]);
        unit.images.push(write_png(dir.path(), "half.png", 40, 20, 0));
        let doc = assemble(vec![unit], &config);

        let mut diag = Diagnostics::new();
        let laid = layout(&doc, &mut diag);
        assert!(diag.is_empty());
        assert_eq!(laid.images.len(), 1);
        // fully transparent black composites to white
        assert!(laid.images[0].rgb.iter().all(|&c| c == 255));

        let placed = laid.pages[0].ops.iter().find_map(|op| match op {
            DrawOp::Image { width, height, .. } => Some((*width, *height)),
            _ => None,
        });
        assert_eq!(placed, Some((40.0, 20.0)));
        assert_eq!(page_texts(&laid.pages[0]), vec!["Look", "Figure 1.1"]);
    }

    #[test]
    fn test_unreadable_figure_is_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig::default();
        let mut unit = text_unit(1, vec![LayoutBlock::Paragraph("Still here".into())]);
        let mut broken = write_png(dir.path(), "broken.png", 30, 30, 255);
        std::fs::write(&broken.path, b"not an image").unwrap();
        broken.ordinal = 0;
        let good = ImageAsset {
            ordinal: 1,
            ..write_png(dir.path(), "good.png", 30, 30, 255)
        };
        unit.images = vec![broken, good];
        let doc = assemble(vec![unit], &config);

        let mut diag = Diagnostics::new();
        let laid = layout(&doc, &mut diag);
        assert_eq!(laid.images.len(), 1);
        assert!(matches!(
            diag.warnings(),
            [Warning::Render { unit: 1, image: 0, .. }]
        ));
        assert!(page_texts(&laid.pages[0]).contains(&"Still here".to_string()));
    }

    #[test]
    fn test_large_raster_is_downsampled() {
        let image = DynamicImage::new_rgb8(1000, 500);
        let scaled = downsample(image, 100.0, 50.0);
        assert_eq!((scaled.width(), scaled.height()), (300, 150));

        let small = DynamicImage::new_rgb8(10, 10);
        assert_eq!(downsample(small, 100.0, 100.0).width(), 10);
    }
}
