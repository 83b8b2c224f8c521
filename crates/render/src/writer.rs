//! Emits laid-out pages through `printpdf` using its built-in base-14 fonts.

use crate::fonts::{decode, Face};
use crate::layout::{DrawOp, LaidOut, RasterImage, PAGE_HEIGHT, PAGE_WIDTH};
use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    Color, Greyscale, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Polygon, Pt,
};
use std::collections::HashMap;
use textbook_core::{Error, Result};

const LAYER_NAME: &str = "Content";
const GRID_GRAY: f32 = 0.3;

/// Document information dictionary entries.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: Option<String>,
}

/// Build the `printpdf` document for `laid`. Coordinates in `laid` are
/// points from the bottom-left corner, the same origin `printpdf` uses.
pub fn build_pdf(laid: &LaidOut, info: &DocumentInfo) -> Result<PdfDocumentReference> {
    let title = info.title.as_deref().unwrap_or_default();
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER_NAME);

    let mut fonts = HashMap::new();
    for face in laid.faces() {
        let font = doc
            .add_builtin_font(face.builtin())
            .map_err(|e| Error::Assembly(format!("cannot add font {:?}: {}", face, e)))?;
        fonts.insert(face, font);
    }

    let rasters = laid
        .images
        .iter()
        .map(to_dynamic)
        .collect::<Result<Vec<_>>>()?;

    for (i, page) in laid.pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER_NAME)
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        for op in &page.ops {
            draw(&layer, op, &fonts, &rasters);
        }
    }

    Ok(doc)
}

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

fn to_dynamic(image: &RasterImage) -> Result<(DynamicImage, &RasterImage)> {
    RgbImage::from_raw(image.width, image.height, image.rgb.clone())
        .map(|rgb| (DynamicImage::ImageRgb8(rgb), image))
        .ok_or_else(|| {
            Error::Assembly(format!(
                "raster of {}x{} has {} sample bytes",
                image.width,
                image.height,
                image.rgb.len()
            ))
        })
}

/// Corner points of an axis-aligned rectangle, counter-clockwise.
fn rect_points(x: f32, y: f32, width: f32, height: f32) -> Vec<(Point, bool)> {
    vec![
        (Point::new(mm(x), mm(y)), false),
        (Point::new(mm(x + width), mm(y)), false),
        (Point::new(mm(x + width), mm(y + height)), false),
        (Point::new(mm(x), mm(y + height)), false),
    ]
}

fn draw(
    layer: &PdfLayerReference,
    op: &DrawOp,
    fonts: &HashMap<Face, IndirectFontRef>,
    rasters: &[(DynamicImage, &RasterImage)],
) {
    match op {
        DrawOp::Text {
            face,
            size,
            x,
            y,
            bytes,
        } => {
            if let Some(font) = fonts.get(face) {
                layer.use_text(decode(bytes), *size, mm(*x), mm(*y), font);
            }
        }
        DrawOp::FillRect {
            x,
            y,
            width,
            height,
            gray,
        } => {
            layer.save_graphics_state();
            layer.set_fill_color(Color::Greyscale(Greyscale::new(*gray, None)));
            layer.add_polygon(Polygon {
                rings: vec![rect_points(*x, *y, *width, *height)],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
            layer.restore_graphics_state();
        }
        DrawOp::StrokeRect {
            x,
            y,
            width,
            height,
            line_width,
        } => {
            layer.save_graphics_state();
            layer.set_outline_color(Color::Greyscale(Greyscale::new(GRID_GRAY, None)));
            layer.set_outline_thickness(*line_width);
            layer.add_line(Line {
                points: rect_points(*x, *y, *width, *height),
                is_closed: true,
            });
            layer.restore_graphics_state();
        }
        DrawOp::Image {
            index,
            x,
            y,
            width,
            height,
        } => {
            let Some((raster, source)) = rasters.get(*index) else {
                log::debug!("draw op references missing image {}", index);
                return;
            };
            // At 72 dpi one sample is one point; scale to the placed size.
            Image::from_dynamic_image(raster).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(mm(*x)),
                    translate_y: Some(mm(*y)),
                    scale_x: Some(*width / source.width as f32),
                    scale_y: Some(*height / source.height as f32),
                    dpi: Some(72.0),
                    ..Default::default()
                },
            );
        }
    }
}
