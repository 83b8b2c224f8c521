//! CLI tool for converting slide decks into textbook-style PDFs.

mod gemini;
mod prompts;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use gemini::GeminiRewriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use textbook_core::{
    config::{DEFAULT_CHUNK_CHAR_BUDGET, DEFAULT_MAX_IMAGE_HEIGHT, DEFAULT_MAX_IMAGE_WIDTH, DEFAULT_MIN_IMAGE_BYTES},
    ConvertConfig, Diagnostics, Error, ExtractOptions, Extractor, FontFamily, IdentityRewriter,
    Pipeline, RetryPolicy, Rewriter, ScratchDir, SourceFormat, StyleSheet,
};
use textbook_pdf::PdfExtractor;
use textbook_pptx::PptxExtractor;
use textbook_render::PdfRenderer;

/// Convert a slide deck (PDF or PPTX) into a textbook-style PDF.
#[derive(Parser, Debug)]
#[command(name = "textbook")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input slide deck (.pdf or .pptx)
    input: PathBuf,

    /// Output PDF (default: <input>_textbook.pdf next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Font family: times, helvetica or courier
    #[arg(long, default_value = "times", value_parser = parse_family)]
    font: FontFamily,

    /// Separate font family for the title and headings
    #[arg(long, value_parser = parse_family)]
    heading_font: Option<FontFamily>,

    /// Lay pages out in two columns
    #[arg(long)]
    two_column: bool,

    /// Maximum figure width in points
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_WIDTH)]
    max_image_width: f32,

    /// Maximum figure height in points
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_HEIGHT)]
    max_image_height: f32,

    /// Images smaller than this many bytes are treated as decorative
    #[arg(long, default_value_t = DEFAULT_MIN_IMAGE_BYTES)]
    min_image_bytes: usize,

    /// Maximum characters per rewrite chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_CHAR_BUDGET)]
    chunk_budget: usize,

    /// Rewrite collaborator applied to each chunk of text
    #[arg(long, value_enum, default_value_t = RewriteMode::None)]
    rewrite: RewriteMode,

    /// API key for the Gemini rewriter
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model name
    #[arg(long, default_value = gemini::DEFAULT_MODEL)]
    model: String,

    /// Per-call timeout for the rewriter, in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Attempts per chunk before falling back to the original text
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Directory for extracted images (default: system temp directory)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Document title (default: input file name)
    #[arg(long)]
    title: Option<String>,

    /// Skip images and convert text only
    #[arg(long)]
    text_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RewriteMode {
    /// Keep the normalized text as is
    None,
    /// Send each chunk to Gemini
    Gemini,
}

fn parse_family(name: &str) -> std::result::Result<FontFamily, String> {
    FontFamily::from_name(name)
        .ok_or_else(|| format!("unknown font family '{}' (expected times, helvetica or courier)", name))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = build_config(&args);
    let mut style = StyleSheet::from_config(&config);
    if let Some(family) = args.heading_font {
        style = style.with_heading_face(family);
    }

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let format = SourceFormat::sniff(&bytes, &args.input)
        .ok_or_else(|| Error::UnsupportedFormat(args.input.display().to_string()))?;
    if args.verbose {
        eprintln!("Processing {} as {}", args.input.display(), format);
    }

    let options = ExtractOptions::from(&config);
    let extractor: Box<dyn Extractor> = match format {
        SourceFormat::Pdf => Box::new(PdfExtractor::new(options)),
        SourceFormat::Pptx => Box::new(PptxExtractor::new(options)),
    };

    let scratch = match &args.scratch_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create scratch directory: {}", dir.display()))?;
            ScratchDir::new_in(dir)?
        }
        None => ScratchDir::new()?,
    };

    let rewriter = select_rewriter(&args)?;
    let title = args
        .title
        .clone()
        .or_else(|| file_stem(&args.input))
        .unwrap_or_default();

    let pipeline = Pipeline::new(config)
        .with_style(style)
        .with_rewriter(rewriter.as_ref())
        .with_title(title.clone());
    let conversion = pipeline
        .run_bytes(extractor.as_ref(), &bytes, scratch)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    if args.verbose {
        eprintln!("  Found {} units", conversion.unit_count);
    }

    let output = output_path(&args.input, args.output.as_deref());
    let mut diag = Diagnostics::new();
    PdfRenderer::new()
        .with_title(title)
        .render_to_file(&conversion.document, &output, &mut diag)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let warnings = conversion.warnings.len() + diag.warnings().len();
    if warnings > 0 {
        eprintln!("Completed with {} warning(s); run with -v for details", warnings);
    }
    if args.verbose {
        eprintln!("Written to: {}", output.display());
    }

    Ok(())
}

fn build_config(args: &Args) -> ConvertConfig {
    let retry = RetryPolicy {
        max_attempts: args.retries.max(1),
        ..RetryPolicy::default()
    };
    ConvertConfig::new()
        .with_font_family(args.font)
        .with_two_column(args.two_column)
        .with_max_image_size(args.max_image_width, args.max_image_height)
        .with_min_image_bytes(args.min_image_bytes)
        .with_chunk_char_budget(args.chunk_budget)
        .with_retry(retry)
        .with_extract_images(!args.text_only)
}

fn select_rewriter(args: &Args) -> Result<Box<dyn Rewriter>> {
    match args.rewrite {
        RewriteMode::None => Ok(Box::new(IdentityRewriter)),
        RewriteMode::Gemini => {
            let Some(key) = args.api_key.clone().filter(|k| !k.trim().is_empty()) else {
                log::warn!("no Gemini API key (set GEMINI_API_KEY or --api-key); text will not be rewritten");
                return Ok(Box::new(IdentityRewriter));
            };
            if args.timeout_secs == 0 {
                bail!("--timeout-secs must be at least 1");
            }
            let rewriter = GeminiRewriter::new(key, &args.model, Duration::from_secs(args.timeout_secs))
                .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
            Ok(Box::new(rewriter))
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.replace(['_', '-'], " "))
        .filter(|s| !s.trim().is_empty())
}

/// Determine the output path for a converted file.
fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    if let Some(path) = output {
        return path.to_path_buf();
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let file_name = format!("{}_textbook.pdf", stem);
    match input.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
