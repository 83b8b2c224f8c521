//! Error types for slide-to-textbook conversion.
//!
//! Only whole-document failures live here. Failures local to one unit,
//! one image or one rewrite chunk are [`crate::Warning`]s instead.

use crate::types::SourceFormat;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a conversion run.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// The source could not be parsed as the claimed container format.
    #[error("Failed to open {format} container: {detail}")]
    ContainerOpen { format: SourceFormat, detail: String },

    /// No unit yielded a usable block or image.
    #[error("No usable text or images found in the source document")]
    EmptyContent,

    /// The caller aborted the run between two units.
    #[error("Conversion cancelled")]
    Cancelled,

    /// The layout or PDF writing stage failed.
    #[error("Document assembly failed: {0}")]
    Assembly(String),
}

impl Error {
    /// Shorthand for a [`Error::ContainerOpen`] with a displayable cause.
    pub fn container(format: SourceFormat, detail: impl std::fmt::Display) -> Self {
        Self::ContainerOpen {
            format,
            detail: detail.to_string(),
        }
    }
}
