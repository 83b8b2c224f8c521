//! The pipeline driver: extract, normalize, rewrite, parse, assemble.
//!
//! Units flow through one at a time in source order. Per-unit problems
//! end up as warnings on the [`Conversion`]; only container-open,
//! empty-content and cancellation abort the run.

use crate::assemble::{Assembler, ParsedUnit};
use crate::config::ConvertConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::markup::MarkupParser;
use crate::normalize::TextNormalizer;
use crate::rewrite::{ChunkRewriter, IdentityRewriter, Rewriter};
use crate::scratch::ScratchDir;
use crate::style::StyleSheet;
use crate::types::Unit;
use crate::warning::{Diagnostics, Warning};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// The result of a successful run.
///
/// Figures point into the run's scratch directory, which lives as long as
/// the conversion does; render before dropping it.
#[derive(Debug)]
pub struct Conversion {
    pub document: Document,
    pub warnings: Vec<Warning>,
    /// Number of units the extractor produced.
    pub unit_count: usize,
    scratch: ScratchDir,
}

impl Conversion {
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

/// Drives one conversion run.
pub struct Pipeline<'a> {
    config: ConvertConfig,
    style: StyleSheet,
    normalizer: TextNormalizer,
    rewriter: &'a dyn Rewriter,
    title: Option<String>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Pipeline<'a> {
    /// A pipeline with the identity rewriter and the config's style sheet.
    pub fn new(config: ConvertConfig) -> Self {
        let style = StyleSheet::from_config(&config);
        Self {
            config,
            style,
            normalizer: TextNormalizer::new(),
            rewriter: &IdentityRewriter,
            title: None,
            cancel: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: &'a dyn Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Replace the style sheet derived from the config (extended mode).
    pub fn with_style(mut self, style: StyleSheet) -> Self {
        self.style = style;
        self
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Abort with [`Error::Cancelled`] once `flag` is set. Checked between units.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Convert the file at `source`.
    pub fn run(&self, extractor: &dyn Extractor, source: &Path, scratch: ScratchDir) -> Result<Conversion> {
        log::debug!("extracting {} as {}", source.display(), extractor.format());
        let mut diag = Diagnostics::new();
        let units = extractor.extract(source, &scratch, &mut diag)?;
        self.finish(units, scratch, diag)
    }

    /// Convert an in-memory container.
    pub fn run_bytes(&self, extractor: &dyn Extractor, bytes: &[u8], scratch: ScratchDir) -> Result<Conversion> {
        let mut diag = Diagnostics::new();
        let units = extractor.extract_bytes(bytes, &scratch, &mut diag)?;
        self.finish(units, scratch, diag)
    }

    fn finish(&self, units: Vec<Unit>, scratch: ScratchDir, mut diag: Diagnostics) -> Result<Conversion> {
        let unit_count = units.len();
        log::debug!("extracted {} units", unit_count);

        let parsed = self.prepare_units(units, &mut diag)?;
        if !parsed.iter().any(ParsedUnit::has_content) {
            return Err(Error::EmptyContent);
        }

        let mut assembler = Assembler::new(self.style.clone(), &self.config);
        if let Some(title) = &self.title {
            assembler = assembler.with_title(title.clone());
        }
        let document = assembler.assemble(&parsed, &mut diag)?;

        Ok(Conversion {
            document,
            warnings: diag.into_warnings(),
            unit_count,
            scratch,
        })
    }

    /// Normalize, rewrite and parse every unit, keeping source order.
    pub fn prepare_units(&self, units: Vec<Unit>, diag: &mut Diagnostics) -> Result<Vec<ParsedUnit>> {
        let mut parsed = Vec::with_capacity(units.len());
        for unit in units {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(Error::Cancelled);
            }
            parsed.push(self.prepare_unit(unit, diag));
        }
        Ok(parsed)
    }

    /// Normalize, rewrite and parse one unit.
    pub fn prepare_unit(&self, unit: Unit, diag: &mut Diagnostics) -> ParsedUnit {
        let normalized = self.normalizer.normalize(&unit.text);
        let rewriter = ChunkRewriter::new(
            self.rewriter,
            self.config.retry,
            self.config.chunk_char_budget,
        );
        let markup = rewriter.rewrite(unit.number, &normalized, diag);
        let blocks = MarkupParser::parse(&markup);
        log::debug!(
            "unit {}: {} blocks, {} images",
            unit.number,
            blocks.len(),
            unit.images.len()
        );

        ParsedUnit {
            number: unit.number,
            blocks,
            images: unit.images,
        }
    }
}
