//! PDF writer for assembled textbook documents.
//!
//! [`PdfRenderer`] paginates a [`Document`] onto A4 pages using the
//! standard Type 1 faces and writes it with `printpdf`. Figures that cannot
//! be read back at render time are skipped and reported as warnings.

pub mod fonts;
pub mod layout;
pub mod writer;

use printpdf::PdfDocumentReference;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use textbook_core::{Diagnostics, Document, Error, Result};

pub use layout::{layout, LaidOut, PAGE_HEIGHT, PAGE_WIDTH};
pub use writer::DocumentInfo;

/// Renders documents to PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    info: DocumentInfo,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.info.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    /// Render to an in-memory PDF file.
    pub fn render_to_bytes(&self, document: &Document, diag: &mut Diagnostics) -> Result<Vec<u8>> {
        self.build(document, diag)?
            .save_to_bytes()
            .map_err(|e| Error::Assembly(format!("failed to serialize PDF: {}", e)))
    }

    /// Render to `path`, replacing any existing file.
    pub fn render_to_file(&self, document: &Document, path: &Path, diag: &mut Diagnostics) -> Result<()> {
        let pdf = self.build(document, diag)?;

        let file = File::create(path)
            .map_err(|e| Error::Assembly(format!("cannot create {}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        if let Err(e) = pdf.save(&mut writer) {
            drop(writer);
            let _ = std::fs::remove_file(path);
            return Err(Error::Assembly(format!("failed to write {}: {}", path.display(), e)));
        }
        writer
            .into_inner()
            .map_err(|e| Error::Assembly(format!("failed to write {}: {}", path.display(), e.error())))?;

        log::info!("wrote {}", path.display());
        Ok(())
    }

    fn build(&self, document: &Document, diag: &mut Diagnostics) -> Result<PdfDocumentReference> {
        let laid = layout(document, diag);
        log::debug!(
            "laid out {} pages with {} images",
            laid.pages.len(),
            laid.images.len()
        );
        writer::build_pdf(&laid, &self.info)
    }
}

/// Render `document` to `path` with default settings.
pub fn render_to_file(document: &Document, path: &Path, diag: &mut Diagnostics) -> Result<()> {
    PdfRenderer::new().render_to_file(document, path, diag)
}
