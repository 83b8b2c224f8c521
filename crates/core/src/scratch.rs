//! Per-run scratch directory for extracted images.
//!
//! Every run owns a fresh `run-*` subdirectory that is removed when the
//! [`ScratchDir`] is dropped. File names derive from (unit, ordinal), so
//! each name is written at most once per run.

use crate::error::Result;
use crate::types::{ImageAsset, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// What happened to one candidate image.
#[derive(Debug)]
pub enum ImageOutcome {
    /// Validated and written to disk.
    Stored(ImageAsset),
    /// Below the size threshold; nothing was written.
    Decorative { byte_len: usize },
    /// Unrecognized or undecodable; any written file was removed.
    Rejected(String),
}

/// A run-scoped directory that disappears with the run.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a run directory under the system temp directory.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("run-").tempdir()?;
        Ok(Self { dir })
    }

    /// Create a run directory under `parent`.
    pub fn new_in(parent: &Path) -> Result<Self> {
        fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix("run-").tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Deterministic file name for an image: `{prefix}_{unit}_{ordinal}.{ext}`.
    pub fn image_path(&self, prefix: &str, unit: usize, ordinal: usize, format: ImageFormat) -> PathBuf {
        self.path()
            .join(format!("{}_{:04}_{:02}.{}", prefix, unit, ordinal, format.extension()))
    }

    /// Validate an image payload and persist it.
    ///
    /// Payloads under `min_bytes` are decorative and never touch the disk.
    /// The format is sniffed from the payload, falling back to `hint`.
    pub fn store_image(
        &self,
        prefix: &str,
        unit: usize,
        ordinal: usize,
        bytes: &[u8],
        hint: Option<ImageFormat>,
        min_bytes: usize,
    ) -> ImageOutcome {
        if bytes.len() < min_bytes {
            return ImageOutcome::Decorative {
                byte_len: bytes.len(),
            };
        }

        let format = image::guess_format(bytes)
            .ok()
            .and_then(ImageFormat::from_detected)
            .or(hint);
        let Some(format) = format else {
            return ImageOutcome::Rejected("unrecognized image format".to_string());
        };

        let path = self.image_path(prefix, unit, ordinal, format);
        if let Err(e) = fs::write(&path, bytes) {
            let _ = fs::remove_file(&path);
            return ImageOutcome::Rejected(format!("failed to write {}: {}", path.display(), e));
        }

        match image::load_from_memory(bytes) {
            Ok(decoded) => ImageOutcome::Stored(ImageAsset {
                path,
                format,
                width: decoded.width(),
                height: decoded.height(),
                byte_len: bytes.len(),
                unit,
                ordinal,
            }),
            Err(e) => {
                let _ = fs::remove_file(&path);
                ImageOutcome::Rejected(format!("{:?} payload does not decode: {}", format, e))
            }
        }
    }
}
