//! Line-oriented markup parser producing [`LayoutBlock`]s.
//!
//! The scan is a small state machine with one transition per input line:
//!
//! ```text
//!            fence                      row
//!   Normal --------> InCode    Normal -------> InTable
//!     ^   <--------    |         ^  <---------   |
//!     |  closing fence |         | blank/non-row | row
//!     |                v         |  (re-scanned) v
//!     |           buffer line    |          buffer row
//! ```
//!
//! Input ends flush whatever is buffered: an unterminated table or an
//! unclosed code block is still emitted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Numbered items: `12. text`, `3.plums`, `1.1 Motivation`. The first
/// group is the label as written.
static ORDINAL_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.(?:\d+(?:\.\d+)*\.?)?)\s*(.*)$").unwrap());

/// A table divider cell: `---`, `:--`, `--:`, `:-:`.
static DIVIDER_CELL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-+:?$").unwrap());

/// Thematic break lines.
static RULE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-{3,}|\*{3,}|_{3,})$").unwrap());

static INLINE_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static INLINE_STRONG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static INLINE_EM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*?)\*").unwrap());
static INLINE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// Line prefixes that mark a callout rendered in italics.
pub const EMPHASIS_MARKERS: &[&str] = &[
    "**Note:**",
    "**Example:**",
    "**Tip:**",
    "**Definition:**",
    "**Warning:**",
];

/// Bullet prefixes, each followed by a space. Includes the glyphs the
/// normalizer breaks lines on.
const BULLET_MARKERS: &[char] = &[
    '-', '*', '+', '•', '◦', '▪', '▫', '●', '○', '■', '□', '►', '▸', '▹', '➢', '➤', '✓', '✔', '❖',
    '–',
];

/// How a list item is marked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListMarker {
    Bullet,
    /// The number as written, trailing period included when present:
    /// `"3."`, `"1.1"`.
    Ordinal(String),
}

/// Rows of a table; the first row is the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub rows: Vec<Vec<String>>,
}

impl TableBlock {
    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn body(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// A typed, style-agnostic piece of document structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutBlock {
    /// Level 1 is the largest.
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem { marker: ListMarker, text: String },
    Table(TableBlock),
    /// Raw lines, never interpreted.
    CodeBlock { lines: Vec<String> },
    /// Callouts and captions, rendered in italics.
    Emphasis(String),
    Spacer,
}

impl LayoutBlock {
    /// Everything except [`LayoutBlock::Spacer`] carries content.
    pub fn has_content(&self) -> bool {
        !matches!(self, LayoutBlock::Spacer)
    }
}

/// Fence flavours; a block closes only on its own flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fence {
    Backtick,
    Tilde,
}

impl Fence {
    fn detect(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            Some(Fence::Backtick)
        } else if trimmed.starts_with("~~~") {
            Some(Fence::Tilde)
        } else {
            None
        }
    }
}

#[derive(Debug)]
enum ScanState {
    Normal,
    InCode { fence: Fence, lines: Vec<String> },
    InTable { rows: Vec<String> },
}

/// Single-pass markup parser.
#[derive(Debug)]
pub struct MarkupParser {
    blocks: Vec<LayoutBlock>,
    state: ScanState,
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupParser {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            state: ScanState::Normal,
        }
    }

    /// Parse a whole text. Total: every input yields a (possibly empty) block list.
    pub fn parse(text: &str) -> Vec<LayoutBlock> {
        let mut parser = Self::new();
        for line in text.lines() {
            parser.feed(line);
        }
        parser.finish()
    }

    /// Advance the state machine by one line.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        let state = std::mem::replace(&mut self.state, ScanState::Normal);

        self.state = match state {
            ScanState::Normal => self.scan_normal(line),
            ScanState::InCode { fence, mut lines } => {
                if Fence::detect(line) == Some(fence) {
                    self.blocks.push(LayoutBlock::CodeBlock { lines });
                    ScanState::Normal
                } else {
                    lines.push(line.to_string());
                    ScanState::InCode { fence, lines }
                }
            }
            ScanState::InTable { mut rows } => {
                if is_table_row(line) {
                    rows.push(line.to_string());
                    ScanState::InTable { rows }
                } else {
                    self.emit_table(&rows);
                    self.scan_normal(line)
                }
            }
        };
    }

    /// Flush any buffered table or code block and return the blocks.
    pub fn finish(mut self) -> Vec<LayoutBlock> {
        match std::mem::replace(&mut self.state, ScanState::Normal) {
            ScanState::Normal => {}
            ScanState::InCode { lines, .. } => {
                log::debug!("unclosed code fence; emitting {} buffered lines", lines.len());
                self.blocks.push(LayoutBlock::CodeBlock { lines });
            }
            ScanState::InTable { rows } => self.emit_table(&rows),
        }
        self.blocks
    }

    fn scan_normal(&mut self, line: &str) -> ScanState {
        if let Some(fence) = Fence::detect(line) {
            return ScanState::InCode {
                fence,
                lines: Vec::new(),
            };
        }
        if is_table_row(line) {
            return ScanState::InTable {
                rows: vec![line.to_string()],
            };
        }
        self.blocks.push(classify_line(line));
        ScanState::Normal
    }

    fn emit_table(&mut self, raw_rows: &[String]) {
        let mut rows: Vec<Vec<String>> = raw_rows
            .iter()
            .map(|row| split_cells(row))
            .filter(|cells| !is_divider(cells))
            .collect();
        if rows.is_empty() {
            return;
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        self.blocks.push(LayoutBlock::Table(TableBlock { rows }));
    }
}

/// Parse markup text into layout blocks.
pub fn parse(text: &str) -> Vec<LayoutBlock> {
    MarkupParser::parse(text)
}

/// Classify one line outside code and table context.
fn classify_line(line: &str) -> LayoutBlock {
    let trimmed = line.trim();
    if trimmed.is_empty() || RULE_REGEX.is_match(trimmed) {
        return LayoutBlock::Spacer;
    }

    if let Some(block) = heading(trimmed) {
        return block;
    }

    if EMPHASIS_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        return LayoutBlock::Emphasis(strip_inline(trimmed));
    }

    if let Some(text) = bullet_text(trimmed) {
        if text.is_empty() {
            return LayoutBlock::Spacer;
        }
        return LayoutBlock::ListItem {
            marker: ListMarker::Bullet,
            text: strip_inline(text),
        };
    }

    if let Some(caps) = ORDINAL_ITEM_REGEX.captures(trimmed) {
        return LayoutBlock::ListItem {
            marker: ListMarker::Ordinal(caps[1].to_string()),
            text: strip_inline(caps[2].trim()),
        };
    }

    LayoutBlock::Paragraph(strip_inline(trimmed))
}

/// `#`..`###` headings. Deeper markers are folded onto level 3.
fn heading(line: &str) -> Option<LayoutBlock> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim_end();
    if text.is_empty() {
        return Some(LayoutBlock::Spacer);
    }
    Some(LayoutBlock::Heading {
        level: level.min(3) as u8,
        text: strip_inline(text),
    })
}

/// Text after a bullet marker, if the line starts with one.
fn bullet_text(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if !BULLET_MARKERS.contains(&first) {
        return None;
    }
    let rest = chars.as_str();
    if rest.is_empty() {
        Some("")
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.len() > 1 && trimmed[1..].contains('|')
}

/// Split `| a | b |` into trimmed cells. `\|` is a literal pipe.
fn split_cells(row: &str) -> Vec<String> {
    let trimmed = row.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = if inner.ends_with('|') && !inner.ends_with("\\|") {
        &inner[..inner.len() - 1]
    } else {
        inner
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    cells
        .into_iter()
        .map(|cell| strip_inline(cell.trim()))
        .collect()
}

fn is_divider(cells: &[String]) -> bool {
    let non_empty: Vec<&String> = cells.iter().filter(|c| !c.is_empty()).collect();
    !non_empty.is_empty() && non_empty.iter().all(|c| DIVIDER_CELL_REGEX.is_match(c))
}

/// Drop inline emphasis, code and link markup, keeping the visible text.
fn strip_inline(text: &str) -> String {
    let text = INLINE_LINK_REGEX.replace_all(text, "$1");
    let text = INLINE_CODE_REGEX.replace_all(&text, "$1");
    let text = INLINE_STRONG_REGEX.replace_all(&text, "$1$2");
    let text = INLINE_EM_REGEX.replace_all(&text, "$1");
    text.into_owned()
}
