//! Core domain types, text normalization, markup parsing and document
//! assembly for converting slide decks into textbook-style documents.

pub mod assemble;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod markup;
pub mod normalize;
pub mod pipeline;
pub mod rewrite;
pub mod scratch;
pub mod style;
pub mod types;
pub mod warning;

pub use assemble::{fit_within, Assembler, ParsedUnit};
pub use config::{ConvertConfig, FontFamily};
pub use document::{Document, Element, Figure, PageTemplate, Placed};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Extractor, ImageSink};
pub use markup::{LayoutBlock, ListMarker, MarkupParser, TableBlock};
pub use normalize::{normalize, TextNormalizer};
pub use pipeline::{Conversion, Pipeline};
pub use rewrite::{IdentityRewriter, RetryPolicy, RewriteError, Rewriter};
pub use scratch::{ImageOutcome, ScratchDir};
pub use style::{Alignment, StyleRole, StyleSheet, TextStyle};
pub use types::{ImageAsset, ImageFormat, SourceFormat, Unit};
pub use warning::{Diagnostics, Warning};
