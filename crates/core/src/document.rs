//! The assembled document: an ordered list of placed elements.

use crate::markup::TableBlock;
use crate::style::{StyleRole, StyleSheet};
use crate::types::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Space between the two columns of the two-column template, in points.
pub const COLUMN_GUTTER: f32 = 18.0;

/// Vertical gap emitted for a blank line, in points.
pub const SPACER_HEIGHT: f32 = 12.0;

/// An image placed into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    /// Scratch file holding the payload.
    pub path: PathBuf,
    pub format: ImageFormat,
    /// Rendered width in points.
    pub width: f32,
    /// Rendered height in points.
    pub height: f32,
    /// e.g. `Figure 3.1`.
    pub caption: String,
    /// 0-based ordinal of the image within its unit.
    pub ordinal: usize,
}

/// A styled, renderable realization of a layout block or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// Flowing text. `label` is the list marker drawn in the indent.
    Text {
        role: StyleRole,
        text: String,
        label: Option<String>,
    },
    /// Grid with a shaded header row.
    Table(TableBlock),
    /// Fixed-width lines, never reflowed.
    Preformatted { lines: Vec<String> },
    Figure(Figure),
    Spacer { height: f32 },
    PageBreak,
}

/// An element with the unit it was derived from.
///
/// Structural elements (title, page breaks) have no unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed {
    pub unit: Option<usize>,
    pub element: Element,
}

/// Page geometry choices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageTemplate {
    pub two_column: bool,
    pub gutter: f32,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self {
            two_column: false,
            gutter: COLUMN_GUTTER,
        }
    }
}

/// The final element sequence handed to a renderer. Not mutated after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub style: StyleSheet,
    pub template: PageTemplate,
    elements: Vec<Placed>,
}

impl Document {
    pub(crate) fn new(style: StyleSheet, template: PageTemplate, elements: Vec<Placed>) -> Self {
        Self {
            style,
            template,
            elements,
        }
    }

    pub fn elements(&self) -> &[Placed] {
        &self.elements
    }

    pub fn page_break_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|p| p.element == Element::PageBreak)
            .count()
    }

    /// Figures in document order.
    pub fn figures(&self) -> impl Iterator<Item = &Figure> {
        self.elements.iter().filter_map(|p| match &p.element {
            Element::Figure(figure) => Some(figure),
            _ => None,
        })
    }
}
