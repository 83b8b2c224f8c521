//! PDF page and image extraction.

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Read};
use textbook_core::{
    Diagnostics, Error, ExtractOptions, Extractor, ImageFormat, ImageSink, Result, ScratchDir,
    SourceFormat, Unit, Warning,
};
use thiserror::Error as ThisError;

/// Why an image XObject could not be turned into an image payload.
#[derive(ThisError, Debug)]
enum XObjectError {
    #[error("missing or invalid /{0}")]
    MissingKey(&'static str),

    #[error("unsupported filter chain {0:?}")]
    UnsupportedFilter(Vec<String>),

    #[error("unsupported colour space {0}")]
    UnsupportedColorSpace(String),

    #[error("unsupported bit depth {0}")]
    UnsupportedDepth(i64),

    #[error("sample data too short: {actual} of {expected} bytes")]
    ShortSamples { expected: usize, actual: usize },

    #[error("stream decode failed: {0}")]
    Decode(String),
}

/// A decoded image XObject ready to hand to the image sink.
struct Payload {
    bytes: Vec<u8>,
    hint: Option<ImageFormat>,
}

/// Extractor for PDF files.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    options: ExtractOptions,
}

impl PdfExtractor {
    /// Create a PDF extractor.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Extract every page of a loaded document.
    pub fn parse(
        &self,
        doc: &Document,
        scratch: &ScratchDir,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Unit>> {
        if doc.is_encrypted() {
            return Err(Error::container(
                SourceFormat::Pdf,
                "encrypted documents are not supported",
            ));
        }

        let sink = ImageSink::new(scratch, "page", self.options);
        let pages = doc.get_pages();
        log::debug!("PDF has {} pages", pages.len());

        let mut units = Vec::with_capacity(pages.len());
        for (index, (page_num, page_id)) in pages.into_iter().enumerate() {
            let number = index + 1;
            let mut unit = Unit::new(number);

            match doc.extract_text(&[page_num]) {
                Ok(text) => unit.text = text,
                Err(e) => diag.warn(Warning::UnitText {
                    unit: number,
                    detail: format!("page {}: {}", page_num, e),
                }),
            }

            if sink.enabled() {
                self.collect_images(doc, page_id, number, &sink, diag, &mut unit);
            }

            units.push(unit);
        }

        Ok(units)
    }

    fn collect_images(
        &self,
        doc: &Document,
        page_id: ObjectId,
        number: usize,
        sink: &ImageSink<'_>,
        diag: &mut Diagnostics,
        unit: &mut Unit,
    ) {
        let Some(xobjects) = page_resources(doc, page_id)
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };

        let mut ordinal = 0;
        for (name, obj) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(doc, obj) else {
                continue;
            };
            if !is_image(stream) {
                log::debug!(
                    "page {}: XObject /{} is not an image, skipped",
                    number,
                    String::from_utf8_lossy(name)
                );
                continue;
            }
            if is_true(stream.dict.get(b"ImageMask").ok()) {
                log::debug!("page {}: stencil mask /{} skipped", number, String::from_utf8_lossy(name));
                continue;
            }

            match decode_image(doc, stream) {
                Ok(payload) => {
                    if let Some(asset) = sink.collect(number, ordinal, &payload.bytes, payload.hint, diag) {
                        unit.images.push(asset);
                    }
                }
                Err(e) => diag.warn(Warning::Image {
                    unit: number,
                    image: ordinal,
                    detail: format!("/{}: {}", String::from_utf8_lossy(name), e),
                }),
            }
            ordinal += 1;
        }
    }
}

impl Extractor for PdfExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Pdf
    }

    fn extract_bytes(
        &self,
        bytes: &[u8],
        scratch: &ScratchDir,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Unit>> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::container(SourceFormat::Pdf, e))?;
        self.parse(&doc, scratch, diag)
    }
}

/// Follow one level of indirection.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The page's resource dictionary, inherited from ancestors when absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Bounded walk; malformed trees can loop.
    for _ in 0..64 {
        if let Some(res) = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        {
            return Some(res);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

fn is_true(obj: Option<&Object>) -> bool {
    matches!(obj, Some(Object::Boolean(true)))
}

/// The stream's filter names, in application order.
fn filter_names(stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).to_string()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_int(dict: &Dictionary, key: &'static str) -> std::result::Result<i64, XObjectError> {
    dict.get(key.as_bytes())
        .and_then(Object::as_i64)
        .map_err(|_| XObjectError::MissingKey(key))
}

/// Turn an image XObject into an encoded image payload.
///
/// DCT and JPX streams already hold a file format and pass through; plain or
/// Flate-compressed 8-bit samples are re-encoded as PNG.
fn decode_image(doc: &Document, stream: &Stream) -> std::result::Result<Payload, XObjectError> {
    let filters = filter_names(stream);
    let (last, leading) = match filters.split_last() {
        Some((last, leading)) => (Some(last.as_str()), leading),
        None => (None, &[][..]),
    };

    match last {
        Some("DCTDecode") | Some("JPXDecode") => {
            let bytes = match leading {
                [] => stream.content.clone(),
                [only] if only == "FlateDecode" => inflate(&stream.content)?,
                _ => return Err(XObjectError::UnsupportedFilter(filters)),
            };
            let hint = if last == Some("DCTDecode") {
                ImageFormat::Jpeg
            } else {
                ImageFormat::Jp2
            };
            Ok(Payload {
                bytes,
                hint: Some(hint),
            })
        }
        None => encode_samples(doc, stream, &stream.content),
        Some("FlateDecode") if leading.is_empty() => {
            let samples = stream
                .decompressed_content()
                .map_err(|e| XObjectError::Decode(e.to_string()))?;
            encode_samples(doc, stream, &samples)
        }
        Some(_) => Err(XObjectError::UnsupportedFilter(filters)),
    }
}

fn inflate(data: &[u8]) -> std::result::Result<Vec<u8>, XObjectError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| XObjectError::Decode(e.to_string()))?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Samples {
    Gray,
    Rgb,
    Cmyk,
}

impl Samples {
    fn channels(self) -> usize {
        match self {
            Samples::Gray => 1,
            Samples::Rgb => 3,
            Samples::Cmyk => 4,
        }
    }
}

/// Map a colour space entry onto a sample layout.
fn color_space(doc: &Document, obj: &Object) -> std::result::Result<Samples, XObjectError> {
    let obj = resolve(doc, obj).ok_or(XObjectError::MissingKey("ColorSpace"))?;
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(Samples::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(Samples::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(Samples::Cmyk),
            other => Err(XObjectError::UnsupportedColorSpace(
                String::from_utf8_lossy(other).to_string(),
            )),
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| o.as_name().ok()).unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok())
                        .ok_or(XObjectError::MissingKey("N"))?;
                    match n {
                        1 => Ok(Samples::Gray),
                        3 => Ok(Samples::Rgb),
                        4 => Ok(Samples::Cmyk),
                        other => Err(XObjectError::UnsupportedColorSpace(format!(
                            "ICCBased with {} components",
                            other
                        ))),
                    }
                }
                b"CalGray" => Ok(Samples::Gray),
                b"CalRGB" => Ok(Samples::Rgb),
                other => Err(XObjectError::UnsupportedColorSpace(
                    String::from_utf8_lossy(other).to_string(),
                )),
            }
        }
        _ => Err(XObjectError::MissingKey("ColorSpace")),
    }
}

/// Re-encode raw 8-bit samples as a PNG file.
fn encode_samples(
    doc: &Document,
    stream: &Stream,
    samples: &[u8],
) -> std::result::Result<Payload, XObjectError> {
    let dict = &stream.dict;
    let width = u32::try_from(dict_int(dict, "Width")?).map_err(|_| XObjectError::MissingKey("Width"))?;
    let height =
        u32::try_from(dict_int(dict, "Height")?).map_err(|_| XObjectError::MissingKey("Height"))?;
    let depth = dict_int(dict, "BitsPerComponent")?;
    if depth != 8 {
        return Err(XObjectError::UnsupportedDepth(depth));
    }
    let layout = color_space(
        doc,
        dict.get(b"ColorSpace")
            .map_err(|_| XObjectError::MissingKey("ColorSpace"))?,
    )?;

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(layout.channels()))
        .ok_or_else(|| XObjectError::Decode(format!("{}x{} image is too large", width, height)))?;
    if samples.len() < expected {
        return Err(XObjectError::ShortSamples {
            expected,
            actual: samples.len(),
        });
    }
    let samples = &samples[..expected];

    let image = match layout {
        Samples::Gray => image::GrayImage::from_raw(width, height, samples.to_vec())
            .map(image::DynamicImage::ImageLuma8),
        Samples::Rgb => image::RgbImage::from_raw(width, height, samples.to_vec())
            .map(image::DynamicImage::ImageRgb8),
        Samples::Cmyk => image::RgbImage::from_raw(width, height, cmyk_to_rgb(samples))
            .map(image::DynamicImage::ImageRgb8),
    }
    .ok_or(XObjectError::ShortSamples {
        expected,
        actual: samples.len(),
    })?;

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| XObjectError::Decode(e.to_string()))?;

    Ok(Payload {
        bytes: out.into_inner(),
        hint: Some(ImageFormat::Png),
    })
}

/// Naive CMYK to RGB conversion.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use lopdf::content::{Content, Operation};
    use lopdf::dictionary;
    use std::io::Write;

    /// One page worth of fixture content.
    struct PageSpec {
        text: Option<&'static str>,
        images: Vec<Stream>,
    }

    fn build_pdf(pages: Vec<PageSpec>, inherit_resources: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids: Vec<Object> = Vec::new();
        let mut shared_xobjects = Dictionary::new();
        for (p, page) in pages.into_iter().enumerate() {
            let mut operations = Vec::new();
            if let Some(text) = page.text {
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text)]),
                    Operation::new("ET", vec![]),
                ]);
            }
            let mut xobjects = Dictionary::new();
            for (i, image) in page.images.into_iter().enumerate() {
                let name = format!("Im{}_{}", p, i);
                let id = doc.add_object(image);
                operations.extend([
                    Operation::new("q", vec![]),
                    Operation::new("cm", vec![100.into(), 0.into(), 0.into(), 100.into(), 72.into(), 72.into()]),
                    Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
                    Operation::new("Q", vec![]),
                ]);
                if inherit_resources {
                    shared_xobjects.set(name, id);
                } else {
                    xobjects.set(name, id);
                }
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !inherit_resources {
                page_dict.set(
                    "Resources",
                    dictionary! {
                        "Font" => dictionary! { "F1" => font_id },
                        "XObject" => xobjects,
                    },
                );
            }
            kids.push(doc.add_object(page_dict).into());
        }

        let count = kids.len() as i64;
        let mut pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        if inherit_resources {
            pages_dict.set(
                "Resources",
                dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => shared_xobjects,
                },
            );
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn rgb_samples(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| [(i % 251) as u8, (i * 7 % 253) as u8, (i * 13 % 255) as u8])
            .collect()
    }

    fn flate_rgb_image(width: u32, height: u32) -> Stream {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&rgb_samples(width, height)).unwrap();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            encoder.finish().unwrap(),
        )
    }

    fn raw_gray_image(width: u32, height: u32) -> Stream {
        let samples: Vec<u8> = (0..width * height).map(|i| (i % 256) as u8).collect();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            samples,
        )
        .with_compression(false)
    }

    fn jpeg_image(width: u32, height: u32) -> Stream {
        let img = image::RgbImage::from_raw(width, height, rgb_samples(width, height)).unwrap();
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .unwrap();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            out.into_inner(),
        )
        .with_compression(false)
    }

    fn all_images() -> ExtractOptions {
        ExtractOptions {
            min_image_bytes: 0,
            extract_images: true,
        }
    }

    fn extract(bytes: &[u8], options: ExtractOptions) -> (Vec<Unit>, Diagnostics, ScratchDir) {
        let scratch = ScratchDir::new().unwrap();
        let mut diag = Diagnostics::new();
        let units = PdfExtractor::new(options)
            .extract_bytes(bytes, &scratch, &mut diag)
            .unwrap();
        (units, diag, scratch)
    }

    #[test]
    fn test_pages_become_numbered_units() {
        let pdf = build_pdf(
            vec![
                PageSpec {
                    text: Some("Cells and tissues"),
                    images: vec![],
                },
                PageSpec {
                    text: Some("Organ systems"),
                    images: vec![],
                },
            ],
            false,
        );
        let (units, diag, _scratch) = extract(&pdf, all_images());

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].number, 1);
        assert_eq!(units[1].number, 2);
        assert!(units[0].text.contains("Cells and tissues"));
        assert!(units[1].text.contains("Organ systems"));
        assert!(diag.is_empty());
    }

    #[test]
    fn test_image_kinds_are_stored() {
        let pdf = build_pdf(
            vec![PageSpec {
                text: Some("Figures"),
                images: vec![jpeg_image(40, 30), flate_rgb_image(24, 12), raw_gray_image(10, 20)],
            }],
            false,
        );
        let (units, diag, _scratch) = extract(&pdf, all_images());

        let images = &units[0].images;
        assert!(diag.is_empty(), "{:?}", diag.warnings());
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].format, ImageFormat::Jpeg);
        assert_eq!((images[0].width, images[0].height), (40, 30));
        assert_eq!(images[1].format, ImageFormat::Png);
        assert_eq!((images[1].width, images[1].height), (24, 12));
        assert_eq!(images[2].format, ImageFormat::Png);
        assert_eq!((images[2].width, images[2].height), (10, 20));
        assert_eq!(
            images.iter().map(|i| i.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_inherited_resources_are_honored() {
        let pdf = build_pdf(
            vec![PageSpec {
                text: None,
                images: vec![flate_rgb_image(16, 16)],
            }],
            true,
        );
        let (units, _, _scratch) = extract(&pdf, all_images());
        assert_eq!(units[0].images.len(), 1);
    }

    #[test]
    fn test_size_filter_drops_small_images() {
        let pdf = build_pdf(
            vec![PageSpec {
                text: Some("Tiny icon"),
                images: vec![raw_gray_image(2, 2)],
            }],
            false,
        );
        let options = ExtractOptions {
            min_image_bytes: 20 * 1024,
            extract_images: true,
        };
        let (units, diag, _scratch) = extract(&pdf, options);
        assert!(units[0].images.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn test_text_only_mode() {
        let pdf = build_pdf(
            vec![PageSpec {
                text: Some("Words"),
                images: vec![flate_rgb_image(16, 16)],
            }],
            false,
        );
        let options = ExtractOptions {
            min_image_bytes: 0,
            extract_images: false,
        };
        let (units, _, _scratch) = extract(&pdf, options);
        assert!(units[0].images.is_empty());
    }

    #[test]
    fn test_unsupported_image_is_a_warning() {
        let mut indexed = raw_gray_image(8, 8);
        indexed.dict.set("ColorSpace", "Pattern");
        let pdf = build_pdf(
            vec![PageSpec {
                text: Some("Odd image"),
                images: vec![indexed, flate_rgb_image(8, 8)],
            }],
            false,
        );
        let (units, diag, _scratch) = extract(&pdf, all_images());

        assert_eq!(units[0].images.len(), 1);
        assert_eq!(units[0].images[0].ordinal, 1);
        assert!(matches!(
            diag.warnings(),
            [Warning::Image { unit: 1, image: 0, .. }]
        ));
    }

    #[test]
    fn test_short_samples_are_rejected() {
        let mut short = raw_gray_image(8, 8);
        short.set_plain_content(vec![0u8; 10]);
        let pdf = build_pdf(
            vec![PageSpec {
                text: Some("Truncated"),
                images: vec![short],
            }],
            false,
        );
        let (units, diag, _scratch) = extract(&pdf, all_images());
        assert!(units[0].images.is_empty());
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => u32::MAX as i64,
                "Height" => u32::MAX as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 16],
        );
        let result = encode_samples(&doc, &stream, &[0u8; 16]);
        assert!(matches!(result, Err(XObjectError::Decode(_))));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
    }

    #[test]
    fn test_garbage_is_container_error() {
        let scratch = ScratchDir::new().unwrap();
        let mut diag = Diagnostics::new();
        let result = PdfExtractor::default().extract_bytes(b"PK\x03\x04 not a pdf", &scratch, &mut diag);
        assert!(matches!(
            result,
            Err(Error::ContainerOpen {
                format: SourceFormat::Pdf,
                ..
            })
        ));
    }
}
