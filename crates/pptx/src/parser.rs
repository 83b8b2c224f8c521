//! PPTX file parser implementation.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use textbook_core::{
    Diagnostics, Error, ExtractOptions, Extractor, ImageFormat, ImageSink, Result, ScratchDir,
    SourceFormat, Unit, Warning,
};
use thiserror::Error as ThisError;
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Failure reading one part of the archive.
#[derive(ThisError, Debug)]
enum PartError {
    #[error("part '{0}' not found in archive")]
    Missing(String),

    #[error("failed to read '{path}': {detail}")]
    Read { path: String, detail: String },

    #[error("XML error in '{path}': {detail}")]
    Xml { path: String, detail: String },
}

/// One entry of a relationships part.
#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    target: String,
    external: bool,
}

/// Extractor for PPTX (Office Open XML) files.
#[derive(Debug, Clone, Default)]
pub struct PptxExtractor {
    options: ExtractOptions,
}

impl PptxExtractor {
    /// Create a PPTX extractor.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Extract every slide from a reader, in presentation order.
    pub fn parse<R: Read + Seek>(
        &self,
        reader: R,
        scratch: &ScratchDir,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Unit>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::container(SourceFormat::Pptx, format!("not a ZIP archive: {}", e)))?;

        // Get the slide order from presentation.xml and its relationships
        let slide_order = self
            .get_slide_order(&mut archive)
            .map_err(|e| Error::container(SourceFormat::Pptx, e))?;

        let sink = ImageSink::new(scratch, "slide", self.options);
        let mut units = Vec::with_capacity(slide_order.len());

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let unit = self.parse_slide(&mut archive, slide_path, idx + 1, &sink, diag);
            units.push(unit);
        }

        Ok(units)
    }

    /// Get the ordered list of slide part paths.
    ///
    /// `sldIdLst` in presentation.xml is authoritative; when it is missing the
    /// slide relationships are ordered by the number in their id or file name.
    fn get_slide_order<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> std::result::Result<Vec<String>, PartError> {
        let rels_content = read_part_string(archive, PRESENTATION_RELS_PATH)?;
        let rels = parse_relationships(&rels_content, PRESENTATION_RELS_PATH)?;

        let slide_rels: HashMap<&String, &Relationship> = rels
            .iter()
            .filter(|(_, rel)| is_slide_relationship(&rel.rel_type))
            .collect();

        let listed = match read_part_string(archive, PRESENTATION_PATH) {
            Ok(xml) => parse_slide_id_list(&xml)?,
            Err(e) => {
                log::debug!("{}; falling back to relationship order", e);
                Vec::new()
            }
        };

        let ordered: Vec<String> = listed
            .iter()
            .filter_map(|rid| slide_rels.get(rid))
            .map(|rel| resolve_part_path("ppt", &rel.target))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }

        let mut slides: Vec<(String, Option<usize>)> = slide_rels
            .iter()
            .map(|(id, rel)| {
                let order_num = extract_slide_number(&rel.target).or_else(|| extract_slide_number(id));
                (resolve_part_path("ppt", &rel.target), order_num)
            })
            .collect();

        // Sort slides by their number
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide. Failures are recorded and yield a text-less unit
    /// so numbering and order stay intact.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
        sink: &ImageSink<'_>,
        diag: &mut Diagnostics,
    ) -> Unit {
        let mut unit = Unit::new(slide_number);

        let content = match read_part_string(archive, slide_path)
            .and_then(|xml| extract_slide_content(&xml, slide_path))
        {
            Ok(content) => content,
            Err(e) => {
                diag.warn(Warning::UnitText {
                    unit: slide_number,
                    detail: e.to_string(),
                });
                return unit;
            }
        };

        let mut shapes = content.shapes;
        sort_by_position(&mut shapes);
        unit.text = shapes
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if sink.enabled() && !content.pictures.is_empty() {
            self.collect_pictures(archive, slide_path, slide_number, &content.pictures, sink, diag, &mut unit);
        }

        unit
    }

    /// Resolve each picture's relationship id to a media part and store it.
    #[allow(clippy::too_many_arguments)]
    fn collect_pictures<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
        picture_ids: &[String],
        sink: &ImageSink<'_>,
        diag: &mut Diagnostics,
        unit: &mut Unit,
    ) {
        let rels_path = slide_rels_path(slide_path);
        let rels = match read_part_string(archive, &rels_path)
            .and_then(|xml| parse_relationships(&xml, &rels_path))
        {
            Ok(rels) => rels,
            Err(e) => {
                // No relationships, no pictures: the slide degrades to text.
                log::debug!("slide {}: {}; extracting text only", slide_number, e);
                return;
            }
        };

        let slide_dir = slide_path.rsplit_once('/').map_or("", |(dir, _)| dir);

        for (ordinal, rid) in picture_ids.iter().enumerate() {
            let Some(rel) = rels.get(rid) else {
                diag.warn(Warning::Image {
                    unit: slide_number,
                    image: ordinal,
                    detail: format!("relationship '{}' not found", rid),
                });
                continue;
            };
            if rel.external {
                log::debug!(
                    "slide {}, image {}: linked picture '{}' skipped",
                    slide_number,
                    ordinal,
                    rel.target
                );
                continue;
            }

            let media_path = resolve_part_path(slide_dir, &rel.target);
            let bytes = match read_part_bytes(archive, &media_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    diag.warn(Warning::Image {
                        unit: slide_number,
                        image: ordinal,
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            let hint = media_path
                .rsplit_once('.')
                .and_then(|(_, ext)| ImageFormat::from_extension(ext));
            if let Some(asset) = sink.collect(slide_number, ordinal, &bytes, hint, diag) {
                unit.images.push(asset);
            }
        }
    }
}

impl Extractor for PptxExtractor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Pptx
    }

    fn extract_bytes(
        &self,
        bytes: &[u8],
        scratch: &ScratchDir,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Unit>> {
        self.parse(Cursor::new(bytes), scratch, diag)
    }
}

/// Text and pictures found in one slide part.
#[derive(Debug, Default)]
struct SlideContent {
    shapes: Vec<ShapeInfo>,
    /// Relationship ids of picture blips, in document order.
    pictures: Vec<String>,
}

/// Information about a shape extracted from XML.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: String,
    x: f64,
    y: f64,
}

/// Extract shapes with text and position, and picture references, from slide XML.
fn extract_slide_content(xml_content: &str, part: &str) -> std::result::Result<SlideContent, PartError> {
    let mut content = SlideContent::default();
    let mut reader = Reader::from_str(xml_content);
    // Text runs carry significant leading/trailing spaces.
    reader.trim_text(false);

    let mut current_shape: Option<ShapeInfo> = None;
    let mut shape_depth = 0usize;
    let mut picture_depth = 0usize;
    let mut in_text_body = false;
    let mut in_run_text = false;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" | b"pic" | b"graphicFrame" => {
                        if shape_depth == 0 {
                            current_shape = Some(ShapeInfo::default());
                            current_text.clear();
                        }
                        shape_depth += 1;
                        if local_name(name.as_ref()) == b"pic" {
                            picture_depth += 1;
                        }
                    }
                    b"off" => read_offset(e, current_shape.as_mut()),
                    b"blip" if picture_depth > 0 => push_blip(e, &mut content.pictures),
                    b"txBody" => in_text_body = true,
                    b"p" if in_text_body => {
                        if !current_text.is_empty() && !current_text.ends_with('\n') {
                            current_text.push('\n');
                        }
                    }
                    b"t" if in_text_body => in_run_text = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"off" => read_offset(e, current_shape.as_mut()),
                    b"blip" if picture_depth > 0 => push_blip(e, &mut content.pictures),
                    b"br" if in_text_body => current_text.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    let text = e.unescape().map_err(|err| PartError::Xml {
                        path: part.to_string(),
                        detail: err.to_string(),
                    })?;
                    current_text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if in_run_text {
                    current_text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" | b"pic" | b"graphicFrame" => {
                        if local_name(name.as_ref()) == b"pic" {
                            picture_depth = picture_depth.saturating_sub(1);
                        }
                        shape_depth = shape_depth.saturating_sub(1);
                        if shape_depth == 0 {
                            // End of shape - save it
                            if let Some(mut shape) = current_shape.take() {
                                shape.text = current_text.trim().to_string();
                                if !shape.text.is_empty() {
                                    content.shapes.push(shape);
                                }
                            }
                            current_text.clear();
                            in_text_body = false;
                            in_run_text = false;
                        }
                    }
                    b"txBody" => in_text_body = false,
                    b"t" => in_run_text = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PartError::Xml {
                    path: part.to_string(),
                    detail: format!("at byte {}: {}", reader.buffer_position(), e),
                });
            }
            _ => {}
        }
    }

    Ok(content)
}

/// Offset element with x and y attributes.
fn read_offset(e: &BytesStart<'_>, shape: Option<&mut ShapeInfo>) {
    let Some(shape) = shape else {
        return;
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"x" => {
                if let Ok(x) = value.parse::<f64>() {
                    shape.x = x;
                }
            }
            b"y" => {
                if let Ok(y) = value.parse::<f64>() {
                    shape.y = y;
                }
            }
            _ => {}
        }
    }
}

/// Record the `r:embed` id of a picture blip.
fn push_blip(e: &BytesStart<'_>, pictures: &mut Vec<String>) {
    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        if key != b"embed" && local_name(key) == b"embed" {
            pictures.push(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
}

/// Sort by position (top-to-bottom, then left-to-right).
fn sort_by_position(shapes: &mut [ShapeInfo]) {
    shapes.sort_by(|a, b| {
        let y_cmp = a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            y_cmp
        }
    });
}

/// Parse a relationships part into `Id -> Relationship`.
fn parse_relationships(
    xml: &str,
    part: &str,
) -> std::result::Result<HashMap<String, Relationship>, PartError> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel = Relationship {
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };

                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }

                if !id.is_empty() {
                    rels.insert(id, rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PartError::Xml {
                    path: part.to_string(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Relationship ids of `p:sldId` entries, in presentation order.
fn parse_slide_id_list(xml: &str) -> std::result::Result<Vec<String>, PartError> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                for attr in e.attributes().flatten() {
                    let key = attr.key.as_ref();
                    // `id` is the numeric slide id; `r:id` is the relationship.
                    if key != b"id" && local_name(key) == b"id" {
                        ids.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PartError::Xml {
                    path: PRESENTATION_PATH.to_string(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(ids)
}

fn is_slide_relationship(rel_type: &str) -> bool {
    rel_type.ends_with("/slide")
}

/// `ppt/slides/slide3.xml` -> `ppt/slides/_rels/slide3.xml.rels`.
fn slide_rels_path(slide_path: &str) -> String {
    match slide_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", slide_path),
    }
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
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

fn read_part_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> std::result::Result<Vec<u8>, PartError> {
    let mut file = archive
        .by_name(path)
        .map_err(|_| PartError::Missing(path.to_string()))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content).map_err(|e| PartError::Read {
        path: path.to_string(),
        detail: e.to_string(),
    })?;

    Ok(content)
}

/// Read a file from the ZIP archive as UTF-8 text.
fn read_part_string<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> std::result::Result<String, PartError> {
    let bytes = read_part_bytes(archive, path)?;
    String::from_utf8(bytes).map_err(|e| PartError::Read {
        path: path.to_string(),
        detail: e.to_string(),
    })
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
