//! The container-extractor seam.
//!
//! Each source format implements [`Extractor`]; the pipeline only ever
//! talks to the trait, so format branching happens once, at the edge.

use crate::config::ConvertConfig;
use crate::error::{Error, Result};
use crate::scratch::{ImageOutcome, ScratchDir};
use crate::types::{ImageAsset, ImageFormat, SourceFormat, Unit};
use crate::warning::{Diagnostics, Warning};
use std::path::Path;

/// The extraction settings taken from a [`ConvertConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Images below this size are decorative and dropped.
    pub min_image_bytes: usize,
    /// When false, no images are extracted at all.
    pub extract_images: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&ConvertConfig::default())
    }
}

impl From<&ConvertConfig> for ExtractOptions {
    fn from(config: &ConvertConfig) -> Self {
        Self {
            min_image_bytes: config.min_image_bytes,
            extract_images: config.extract_images,
        }
    }
}

/// Produces units from one container format.
pub trait Extractor {
    /// The format this extractor understands.
    fn format(&self) -> SourceFormat;

    /// Extract every unit of an in-memory container, in source order.
    ///
    /// Fails only when the container itself cannot be opened; per-unit and
    /// per-image failures are recorded in `diag`.
    fn extract_bytes(
        &self,
        bytes: &[u8],
        scratch: &ScratchDir,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Unit>>;

    /// Read `path` and extract it.
    fn extract(&self, path: &Path, scratch: &ScratchDir, diag: &mut Diagnostics) -> Result<Vec<Unit>> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::container(self.format(), format!("{}: {}", path.display(), e)))?;
        self.extract_bytes(&bytes, scratch, diag)
    }
}

/// Validates and stores a container's images in the run's scratch directory.
#[derive(Debug, Clone, Copy)]
pub struct ImageSink<'a> {
    scratch: &'a ScratchDir,
    prefix: &'a str,
    options: ExtractOptions,
}

impl<'a> ImageSink<'a> {
    /// `prefix` names the scratch files (`page`, `slide`).
    pub fn new(scratch: &'a ScratchDir, prefix: &'a str, options: ExtractOptions) -> Self {
        Self {
            scratch,
            prefix,
            options,
        }
    }

    pub fn enabled(&self) -> bool {
        self.options.extract_images
    }

    /// Store one candidate image, turning the outcome into either an asset
    /// or a recorded warning.
    pub fn collect(
        &self,
        unit: usize,
        ordinal: usize,
        bytes: &[u8],
        hint: Option<ImageFormat>,
        diag: &mut Diagnostics,
    ) -> Option<ImageAsset> {
        let outcome = self.scratch.store_image(
            self.prefix,
            unit,
            ordinal,
            bytes,
            hint,
            self.options.min_image_bytes,
        );
        match outcome {
            ImageOutcome::Stored(asset) => Some(asset),
            ImageOutcome::Decorative { byte_len } => {
                log::debug!(
                    "unit {}, image {}: {} bytes, dropped as decorative",
                    unit,
                    ordinal,
                    byte_len
                );
                None
            }
            ImageOutcome::Rejected(detail) => {
                diag.warn(Warning::Image {
                    unit,
                    image: ordinal,
                    detail,
                });
                None
            }
        }
    }
}
