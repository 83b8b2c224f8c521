//! PPTX (Office Open XML) extractor backend.
//!
//! Reads .pptx files, which are ZIP archives of XML parts, into one
//! [`textbook_core::Unit`] per slide: shape text plus picture payloads.

pub mod parser;

pub use parser::PptxExtractor;
