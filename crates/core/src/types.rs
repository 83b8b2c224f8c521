//! Domain types for representing extracted slide-deck content.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The container format of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Portable Document Format; one unit per page.
    Pdf,
    /// Modern PPTX (Office Open XML); one unit per slide.
    Pptx,
}

impl SourceFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PDF header (%PDF-x.y)
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        None
    }

    /// Magic bytes first, then the path's extension.
    pub fn sniff(bytes: &[u8], path: &Path) -> Option<Self> {
        Self::from_magic(bytes).or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension)
        })
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => f.write_str("PDF"),
            SourceFormat::Pptx => f.write_str("PPTX"),
        }
    }
}

/// Raster format of an extracted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    /// JPEG 2000. Kept as a tag; payloads in this format fail validation
    /// because no decoder for it is linked in.
    Jp2,
}

impl ImageFormat {
    /// Map a codec name or file extension to a tag.
    ///
    /// Container-specific spellings are folded onto one tag each
    /// (`jpx`/`j2k` are JPEG 2000, `jpg`/`jpe` are JPEG, `tif` is TIFF).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "jp2" | "jpx" | "j2k" | "jpf" => Some(Self::Jp2),
            _ => None,
        }
    }

    /// Tag for a format detected by the `image` crate.
    pub fn from_detected(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Canonical file extension used for scratch files.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tif",
            ImageFormat::Jp2 => "jp2",
        }
    }
}

/// An embedded image, validated and persisted to the run's scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Scratch file holding the payload.
    pub path: PathBuf,

    /// Format tag of the payload.
    pub format: ImageFormat,

    /// Natural width in pixels.
    pub width: u32,

    /// Natural height in pixels.
    pub height: u32,

    /// Payload size in bytes.
    pub byte_len: usize,

    /// 1-based number of the unit the image came from.
    pub unit: usize,

    /// 0-based position among the unit's images, in extraction order.
    pub ordinal: usize,
}

impl ImageAsset {
    /// Read the payload back from the scratch directory.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// One page (PDF) or slide (PPTX) of source content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// 1-based position in the source document.
    pub number: usize,

    /// Raw extracted text.
    pub text: String,

    /// Images in extraction order.
    pub images: Vec<ImageAsset>,
}

impl Unit {
    /// Create an empty unit with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            text: String::new(),
            images: Vec::new(),
        }
    }

    /// Whether the unit has neither text nor images.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}
