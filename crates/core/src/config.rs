//! Conversion settings shared by every pipeline stage.
//!
//! Each component receives the values it needs from a [`ConvertConfig`]
//! passed in by the caller; nothing is read from global state.

use crate::rewrite::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default decorative-image threshold: payloads below 20 KiB are dropped.
pub const DEFAULT_MIN_IMAGE_BYTES: usize = 20 * 1024;

/// Default character budget for one rewrite chunk.
pub const DEFAULT_CHUNK_CHAR_BUDGET: usize = 1500;

/// Default figure bounding box: 4 x 3 inches, in points.
pub const DEFAULT_MAX_IMAGE_WIDTH: f32 = 288.0;
pub const DEFAULT_MAX_IMAGE_HEIGHT: f32 = 216.0;

/// Typeface families available for the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Times,
    Helvetica,
    Courier,
}

impl FontFamily {
    /// Parse a family name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "times" | "timesroman" | "serif" => Some(Self::Times),
            "helvetica" | "arial" | "sans" | "sansserif" => Some(Self::Helvetica),
            "courier" | "mono" | "monospace" => Some(Self::Courier),
            _ => None,
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontFamily::Times => f.write_str("Times-Roman"),
            FontFamily::Helvetica => f.write_str("Helvetica"),
            FontFamily::Courier => f.write_str("Courier"),
        }
    }
}

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Face family used for every text role except code.
    pub font_family: FontFamily,

    /// Lay pages out as two equal columns.
    pub two_column: bool,

    /// Figure bounding box width, in points.
    pub max_image_width: f32,

    /// Figure bounding box height, in points.
    pub max_image_height: f32,

    /// Images with fewer bytes than this are treated as decorative.
    pub min_image_bytes: usize,

    /// Maximum characters per rewrite chunk.
    pub chunk_char_budget: usize,

    /// Retry policy for the rewrite collaborator.
    pub retry: RetryPolicy,

    /// Extract embedded images at all. When false, extraction is text-only.
    pub extract_images: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            font_family: FontFamily::default(),
            two_column: false,
            max_image_width: DEFAULT_MAX_IMAGE_WIDTH,
            max_image_height: DEFAULT_MAX_IMAGE_HEIGHT,
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            chunk_char_budget: DEFAULT_CHUNK_CHAR_BUDGET,
            retry: RetryPolicy::default(),
            extract_images: true,
        }
    }
}

impl ConvertConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font_family(mut self, family: FontFamily) -> Self {
        self.font_family = family;
        self
    }

    pub fn with_two_column(mut self, two_column: bool) -> Self {
        self.two_column = two_column;
        self
    }

    /// Set the figure bounding box. Non-positive dimensions are clamped to 1 pt.
    pub fn with_max_image_size(mut self, width: f32, height: f32) -> Self {
        self.max_image_width = width.max(1.0);
        self.max_image_height = height.max(1.0);
        self
    }

    pub fn with_min_image_bytes(mut self, bytes: usize) -> Self {
        self.min_image_bytes = bytes;
        self
    }

    /// Set the rewrite chunk budget (at least 1 character).
    pub fn with_chunk_char_budget(mut self, budget: usize) -> Self {
        self.chunk_char_budget = budget.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_extract_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }
}
