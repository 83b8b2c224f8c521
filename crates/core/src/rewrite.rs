//! The optional rewrite collaborator and the chunking/retry policy around it.
//!
//! A rewriter turns a chunk of cleaned text into markup (typically a
//! language-model call). It is external, slow and fallible, so every
//! chunk gets a bounded number of attempts with growing backoff and
//! falls back to the unmodified chunk when all attempts fail. A broken
//! or missing rewriter never aborts a conversion.
//!
//! ## Retry Strategy
//!
//! Attempt `n > 1` waits `base_backoff * 2^(n-2)` before calling the
//! rewriter again: with the default 1 s base and 3 attempts the waits
//! are 1 s then 2 s.

use crate::warning::{Diagnostics, Warning};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Separator placed between rewritten chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// A response that opens and closes with a fence line. The first group is
/// the info string.
static OUTER_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```(markdown|md)?\n(.*)\n```$").unwrap());

/// Why a rewrite attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// Worth retrying: timeouts, rate limits, 5xx responses.
    #[error("transient rewrite failure: {0}")]
    Transient(String),

    /// Retrying cannot help: missing credentials, rejected request.
    #[error("rewrite unavailable: {0}")]
    Unavailable(String),
}

/// A text-to-markup transformation applied per chunk.
///
/// Implementations must tolerate being called again with the same chunk.
pub trait Rewriter {
    /// Rewrite one chunk into markup.
    fn rewrite(&self, chunk: &str) -> Result<String, RewriteError>;

    /// True when the rewriter returns its input untouched, letting callers
    /// skip chunking altogether.
    fn is_identity(&self) -> bool {
        false
    }
}

impl<F> Rewriter for F
where
    F: Fn(&str) -> Result<String, RewriteError>,
{
    fn rewrite(&self, chunk: &str) -> Result<String, RewriteError> {
        self(chunk)
    }
}

/// The no-op collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewriter;

impl Rewriter for IdentityRewriter {
    fn rewrite(&self, chunk: &str) -> Result<String, RewriteError> {
        Ok(chunk.to_string())
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per chunk, including the first one.
    pub max_attempts: u32,

    /// Wait before the first retry; doubled for each further retry.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately; meant for tests and local stubs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
        }
    }

    /// Wait before attempt `attempt` (1-based). The first attempt never waits.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt - 2))
    }
}

/// Split text into contiguous word sequences of at most `budget` characters.
///
/// Line breaks inside a chunk are kept so the unrewritten fallback still
/// parses line by line. A single word longer than the budget becomes a
/// chunk of its own.
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    split_chunks(text, budget)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

/// A chunk plus the whitespace it was cut from its predecessor at.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    text: String,
    /// `" "` or `"\n"`; empty for the first chunk.
    cut: &'static str,
}

fn split_chunks(text: &str, budget: usize) -> Vec<Chunk> {
    let budget = budget.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_cut = "";

    for line in text.lines() {
        let mut line_start = true;
        for word in line.split_whitespace() {
            let sep = if line_start { "\n" } else { " " };
            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + sep.len() + word.chars().count() > budget {
                chunks.push(Chunk {
                    text: std::mem::take(&mut current),
                    cut: current_cut,
                });
                current_cut = sep;
                current.push_str(word);
            } else {
                current.push_str(sep);
                current.push_str(word);
            }
            line_start = false;
        }
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            text: current,
            cut: current_cut,
        });
    }
    chunks
}

/// Drives a [`Rewriter`] over a unit's text chunk by chunk.
pub struct ChunkRewriter<'a> {
    rewriter: &'a dyn Rewriter,
    policy: RetryPolicy,
    budget: usize,
}

impl<'a> ChunkRewriter<'a> {
    pub fn new(rewriter: &'a dyn Rewriter, policy: RetryPolicy, budget: usize) -> Self {
        Self {
            rewriter,
            policy,
            budget: budget.max(1),
        }
    }

    /// Rewrite a unit's normalized text, falling back per chunk.
    ///
    /// Rewritten chunks are set apart by [`CHUNK_SEPARATOR`]. Adjacent
    /// chunks that both fell back are rejoined at their original cut, so a
    /// unit whose every chunk fails comes back unchanged. With the identity
    /// collaborator the text is returned as is.
    pub fn rewrite(&self, unit: usize, text: &str, diag: &mut Diagnostics) -> String {
        if self.rewriter.is_identity() || text.trim().is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut prev_rewritten = false;
        for (idx, chunk) in split_chunks(text, self.budget).into_iter().enumerate() {
            let (piece, rewritten) = match self.rewrite_chunk(&chunk.text) {
                Ok(markup) => (markup, true),
                Err((attempts, err)) => {
                    diag.warn(Warning::Rewrite {
                        unit,
                        chunk: idx,
                        attempts,
                        detail: err.to_string(),
                    });
                    (chunk.text, false)
                }
            };
            if idx > 0 {
                // Two fallback neighbours are rejoined exactly as they were cut.
                out.push_str(if rewritten || prev_rewritten {
                    CHUNK_SEPARATOR
                } else {
                    chunk.cut
                });
            }
            out.push_str(&piece);
            prev_rewritten = rewritten;
        }
        out
    }

    /// Call the rewriter until it succeeds or the policy is exhausted.
    ///
    /// On failure returns the number of attempts made and the last error.
    fn rewrite_chunk(&self, chunk: &str) -> Result<String, (u32, RewriteError)> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_err = RewriteError::Transient("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            let backoff = self.policy.backoff_before(attempt);
            if !backoff.is_zero() {
                log::debug!(
                    "rewrite retry {}/{} after {}ms",
                    attempt,
                    max_attempts,
                    backoff.as_millis()
                );
                std::thread::sleep(backoff);
            }

            match self.rewriter.rewrite(chunk) {
                Ok(markup) => {
                    let markup = tidy_markup(&markup);
                    if !markup.trim().is_empty() {
                        return Ok(markup);
                    }
                    last_err = RewriteError::Transient("empty response".to_string());
                }
                Err(err @ RewriteError::Unavailable(_)) => return Err((attempt, err)),
                Err(err) => {
                    log::debug!("rewrite attempt {} failed: {}", attempt, err);
                    last_err = err;
                }
            }
        }

        Err((max_attempts, last_err))
    }
}

/// Undo the usual packaging quirks of model output: CRLF line endings and
/// a fence wrapped around the whole response.
///
/// A bare outer fence is only unwrapped when the body holds no fence of
/// its own; otherwise the response starts and ends with real code blocks.
fn tidy_markup(markup: &str) -> String {
    let markup = markup.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = markup.trim();
    let Some(caps) = OUTER_FENCE_REGEX.captures(trimmed) else {
        return trimmed.to_string();
    };
    let body = caps.get(2).map_or("", |m| m.as_str());
    let labelled = caps.get(1).is_some();
    if labelled || !body.lines().any(|line| line.trim_start().starts_with("```")) {
        body.to_string()
    } else {
        trimmed.to_string()
    }
}
