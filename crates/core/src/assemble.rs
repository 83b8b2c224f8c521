//! Turns parsed units into a [`Document`].
//!
//! Units are laid down strictly in source order: a unit's blocks, then its
//! images as captioned figures, then a page break before the next unit.
//! Geometry beyond figure sizing (wrapping, frames, columns) is left to
//! the renderer and cannot change the order established here.

use crate::config::ConvertConfig;
use crate::document::{Document, Element, Figure, PageTemplate, Placed, COLUMN_GUTTER, SPACER_HEIGHT};
use crate::error::{Error, Result};
use crate::markup::{LayoutBlock, ListMarker};
use crate::style::{StyleRole, StyleSheet};
use crate::types::ImageAsset;
use crate::warning::{Diagnostics, Warning};

/// A unit after normalization and markup parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnit {
    /// 1-based position in the source.
    pub number: usize,
    pub blocks: Vec<LayoutBlock>,
    pub images: Vec<ImageAsset>,
}

impl ParsedUnit {
    /// Whether the unit contributes any block or image.
    pub fn has_content(&self) -> bool {
        !self.images.is_empty() || self.blocks.iter().any(LayoutBlock::has_content)
    }
}

/// Scale `width x height` down to fit `max_width x max_height`, keeping
/// the aspect ratio. Images already inside the box are left at natural size.
pub fn fit_within(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_width / width).min(max_height / height).min(1.0);
    (width * scale, height * scale)
}

/// Builds documents from parsed units.
#[derive(Debug, Clone)]
pub struct Assembler {
    style: StyleSheet,
    template: PageTemplate,
    max_image_width: f32,
    max_image_height: f32,
    title: Option<String>,
}

impl Assembler {
    pub fn new(style: StyleSheet, config: &ConvertConfig) -> Self {
        Self {
            style,
            template: PageTemplate {
                two_column: config.two_column,
                gutter: COLUMN_GUTTER,
            },
            max_image_width: config.max_image_width,
            max_image_height: config.max_image_height,
            title: None,
        }
    }

    /// Put a centered title element at the top of the document.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    /// Lay out every unit in order.
    ///
    /// Fails with [`Error::EmptyContent`] when no unit has a block or image.
    pub fn assemble(&self, units: &[ParsedUnit], diag: &mut Diagnostics) -> Result<Document> {
        if !units.iter().any(ParsedUnit::has_content) {
            return Err(Error::EmptyContent);
        }

        let mut elements = Vec::new();
        if let Some(title) = &self.title {
            elements.push(Placed {
                unit: None,
                element: Element::Text {
                    role: StyleRole::Title,
                    text: title.clone(),
                    label: None,
                },
            });
        }

        for (idx, unit) in units.iter().enumerate() {
            if idx > 0 {
                elements.push(Placed {
                    unit: None,
                    element: Element::PageBreak,
                });
            }

            for block in &unit.blocks {
                elements.push(Placed {
                    unit: Some(unit.number),
                    element: block_element(block),
                });
            }

            let mut figure_number = 0;
            for image in &unit.images {
                let (width, height) = fit_within(
                    image.width as f32,
                    image.height as f32,
                    self.max_image_width,
                    self.max_image_height,
                );
                if width <= 0.0 || height <= 0.0 {
                    diag.warn(Warning::Render {
                        unit: unit.number,
                        image: image.ordinal,
                        detail: format!("degenerate size {}x{}", image.width, image.height),
                    });
                    continue;
                }

                figure_number += 1;
                elements.push(Placed {
                    unit: Some(unit.number),
                    element: Element::Figure(Figure {
                        path: image.path.clone(),
                        format: image.format,
                        width,
                        height,
                        caption: format!("Figure {}.{}", unit.number, figure_number),
                        ordinal: image.ordinal,
                    }),
                });
                elements.push(Placed {
                    unit: Some(unit.number),
                    element: Element::Spacer {
                        height: SPACER_HEIGHT,
                    },
                });
            }
        }

        log::debug!("assembled {} elements from {} units", elements.len(), units.len());
        Ok(Document::new(self.style.clone(), self.template, elements))
    }
}

fn block_element(block: &LayoutBlock) -> Element {
    let text = |role: StyleRole, text: &str, label: Option<String>| Element::Text {
        role,
        text: text.to_string(),
        label,
    };

    match block {
        LayoutBlock::Heading { level, text: t } => text(StyleRole::heading(*level), t, None),
        LayoutBlock::Paragraph(t) => text(StyleRole::Body, t, None),
        LayoutBlock::ListItem { marker, text: t } => {
            let label = match marker {
                ListMarker::Bullet => "•".to_string(),
                ListMarker::Ordinal(label) => label.clone(),
            };
            text(StyleRole::ListItem, t, Some(label))
        }
        LayoutBlock::Emphasis(t) => text(StyleRole::Emphasis, t, None),
        LayoutBlock::Table(table) => Element::Table(table.clone()),
        LayoutBlock::CodeBlock { lines } => Element::Preformatted {
            lines: lines.clone(),
        },
        LayoutBlock::Spacer => Element::Spacer {
            height: SPACER_HEIGHT,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::TableBlock;
    use crate::types::ImageFormat;
    use std::path::PathBuf;

    fn unit(number: usize, blocks: Vec<LayoutBlock>) -> ParsedUnit {
        ParsedUnit {
            number,
            blocks,
            images: Vec::new(),
        }
    }

    fn image(unit: usize, ordinal: usize, width: u32, height: u32) -> ImageAsset {
        ImageAsset {
            path: PathBuf::from(format!("/scratch/img_{}_{}.png", unit, ordinal)),
            format: ImageFormat::Png,
            width,
            height,
            byte_len: 30_000,
            unit,
            ordinal,
        }
    }

    fn assembler() -> Assembler {
        Assembler::new(StyleSheet::default(), &ConvertConfig::default())
    }

    #[test]
    fn test_fit_within_width_bound() {
        assert_eq!(fit_within(800.0, 400.0, 300.0, 300.0), (300.0, 150.0));
    }

    #[test]
    fn test_fit_within_height_bound() {
        assert_eq!(fit_within(400.0, 800.0, 300.0, 300.0), (150.0, 300.0));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(100.0, 50.0, 300.0, 300.0), (100.0, 50.0));
        assert_eq!(fit_within(0.0, 50.0, 300.0, 300.0), (0.0, 0.0));
    }

    #[test]
    fn test_page_breaks_between_units_only() {
        let units: Vec<ParsedUnit> = (1..=4)
            .map(|n| unit(n, vec![LayoutBlock::Paragraph(format!("unit {}", n))]))
            .collect();
        let mut diag = Diagnostics::new();
        let doc = assembler().assemble(&units, &mut diag).unwrap();

        assert_eq!(doc.page_break_count(), 3);
        let order: Vec<usize> = doc.elements().iter().filter_map(|p| p.unit).collect();
        assert!(order.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(doc.elements().last().and_then(|p| p.unit), Some(4));
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let units = vec![unit(1, vec![LayoutBlock::Spacer]), unit(2, vec![])];
        let mut diag = Diagnostics::new();
        assert!(matches!(
            assembler().assemble(&units, &mut diag),
            Err(Error::EmptyContent)
        ));
        assert!(matches!(
            assembler().assemble(&[], &mut diag),
            Err(Error::EmptyContent)
        ));
    }

    #[test]
    fn test_image_only_unit_is_content() {
        let mut u = unit(1, vec![]);
        u.images.push(image(1, 0, 640, 480));
        let mut diag = Diagnostics::new();
        let doc = assembler().assemble(&[u], &mut diag).unwrap();
        assert_eq!(doc.figures().count(), 1);
    }

    #[test]
    fn test_figures_follow_blocks_with_unit_labels() {
        let mut u = unit(3, vec![LayoutBlock::Paragraph("text".into())]);
        u.images.push(image(3, 0, 800, 400));
        u.images.push(image(3, 2, 100, 100));
        let config = ConvertConfig::default().with_max_image_size(300.0, 300.0);
        let mut diag = Diagnostics::new();
        let doc = Assembler::new(StyleSheet::default(), &config)
            .assemble(&[u], &mut diag)
            .unwrap();

        assert!(matches!(doc.elements()[0].element, Element::Text { .. }));
        let figures: Vec<&Figure> = doc.figures().collect();
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].caption, "Figure 3.1");
        assert_eq!((figures[0].width, figures[0].height), (300.0, 150.0));
        assert_eq!(figures[1].caption, "Figure 3.2");
        assert_eq!(figures[1].ordinal, 2);
    }

    #[test]
    fn test_degenerate_image_is_skipped_with_warning() {
        let mut u = unit(1, vec![LayoutBlock::Paragraph("text".into())]);
        u.images.push(image(1, 0, 0, 10));
        let mut diag = Diagnostics::new();
        let doc = assembler().assemble(&[u], &mut diag).unwrap();
        assert_eq!(doc.figures().count(), 0);
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn test_block_to_element_mapping() {
        let blocks = vec![
            LayoutBlock::Heading {
                level: 2,
                text: "H".into(),
            },
            LayoutBlock::ListItem {
                marker: ListMarker::Ordinal("4.".into()),
                text: "item".into(),
            },
            LayoutBlock::Emphasis("Note: x".into()),
            LayoutBlock::Table(TableBlock {
                rows: vec![vec!["A".into()], vec!["1".into()]],
            }),
            LayoutBlock::CodeBlock {
                lines: vec!["fn main() {}".into()],
            },
            LayoutBlock::Spacer,
        ];
        let mut diag = Diagnostics::new();
        let doc = assembler()
            .with_title("Lecture 1")
            .assemble(&[unit(1, blocks)], &mut diag)
            .unwrap();
        let elements: Vec<&Element> = doc.elements().iter().map(|p| &p.element).collect();

        assert_eq!(
            elements[0],
            &Element::Text {
                role: StyleRole::Title,
                text: "Lecture 1".into(),
                label: None
            }
        );
        assert_eq!(doc.elements()[0].unit, None);
        assert_eq!(
            elements[1],
            &Element::Text {
                role: StyleRole::Heading2,
                text: "H".into(),
                label: None
            }
        );
        assert_eq!(
            elements[2],
            &Element::Text {
                role: StyleRole::ListItem,
                text: "item".into(),
                label: Some("4.".into())
            }
        );
        assert!(matches!(
            elements[3],
            Element::Text {
                role: StyleRole::Emphasis,
                ..
            }
        ));
        assert!(matches!(elements[4], Element::Table(_)));
        assert!(matches!(elements[5], Element::Preformatted { .. }));
        assert!(matches!(elements[6], Element::Spacer { .. }));
    }

    #[test]
    fn test_blank_title_is_ignored() {
        let mut diag = Diagnostics::new();
        let doc = assembler()
            .with_title("  ")
            .assemble(&[unit(1, vec![LayoutBlock::Paragraph("x".into())])], &mut diag)
            .unwrap();
        assert_eq!(doc.elements().len(), 1);
    }
}
