//! Recoverable, per-unit failures.
//!
//! A warning never aborts a run: the affected text, image or chunk is
//! omitted (or left unrewritten) and the conversion carries on.

use thiserror::Error;

/// A recoverable failure with enough context to locate it in the source.
///
/// Unit numbers are 1-based, image ordinals are 0-based within their unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Text of one page or slide could not be extracted.
    #[error("unit {unit}: text extraction failed: {detail}")]
    UnitText { unit: usize, detail: String },

    /// One embedded image was unreadable or failed validation.
    #[error("unit {unit}, image {image}: {detail}")]
    Image {
        unit: usize,
        image: usize,
        detail: String,
    },

    /// The rewrite collaborator gave up on a chunk; the original text was kept.
    #[error("unit {unit}, chunk {chunk}: rewrite failed after {attempts} attempts: {detail}")]
    Rewrite {
        unit: usize,
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    /// An image could not be placed into the output document.
    #[error("unit {unit}, image {image}: skipped while rendering: {detail}")]
    Render {
        unit: usize,
        image: usize,
        detail: String,
    },
}

impl Warning {
    /// The 1-based unit this warning belongs to.
    pub fn unit(&self) -> usize {
        match self {
            Warning::UnitText { unit, .. }
            | Warning::Image { unit, .. }
            | Warning::Rewrite { unit, .. }
            | Warning::Render { unit, .. } => *unit,
        }
    }
}

/// Collects warnings for a run, logging each one as it arrives.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Warnings recorded so far, in arrival order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Move every warning of `other` into this sink without logging again.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
