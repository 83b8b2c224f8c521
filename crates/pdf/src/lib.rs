//! PDF extractor backend for slide-to-textbook conversion.
//!
//! Each page becomes one unit: its text as reported by the content stream,
//! and the image XObjects reachable from its resources.

pub mod parser;

pub use parser::PdfExtractor;
