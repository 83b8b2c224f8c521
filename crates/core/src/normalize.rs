//! Text cleanup for raw slide and page text.
//!
//! Extracted text arrives with arbitrary line breaks: PDF text streams
//! break mid-sentence, slide text runs lose their bullet structure. The
//! normalizer flattens everything to one line and then re-segments it
//! with a fixed sequence of regex rules:
//!
//! 1. collapse whitespace runs to single spaces
//! 2. break before bullet glyphs and indent markers
//! 3. break before `N.` numbered-list markers
//! 4. break after sentence-terminal punctuation followed by an uppercase letter
//!
//! Later rules see the output of earlier ones, so the order is fixed.
//! Every rule only turns spaces into line breaks (and back on the next
//! pass), which makes the whole transformation idempotent.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Any run of whitespace, line breaks included.
static WHITESPACE_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Bullet glyphs as they come out of slide decks and PDF text layers.
static BULLET_GLYPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([•◦▪▫●○■□►▸▹➢➤✓✔❖])\s*").unwrap());

/// Second-level indent marker: a free-standing en dash.
static INDENT_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(–)\s+").unwrap());

/// `12.` list markers. Capped at three digits so years are left alone.
static NUMBERED_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(\d{1,3}\.)\s+").unwrap());

/// Sentence end followed by the start of a new sentence.
static SENTENCE_BREAK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])\s+(\p{Lu})").unwrap());

/// Deterministic cleanup of extracted text.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Whether rule 4 (sentence re-segmentation) runs.
    sentence_breaks: bool,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            sentence_breaks: true,
        }
    }
}

impl TextNormalizer {
    /// Create a normalizer with every rule enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the sentence re-segmentation rule.
    pub fn with_sentence_breaks(mut self, enabled: bool) -> Self {
        self.sentence_breaks = enabled;
        self
    }

    /// Normalize raw text into trimmed, non-empty lines joined by `\n`.
    ///
    /// Total: empty or whitespace-only input yields an empty string.
    pub fn normalize(&self, raw: &str) -> String {
        // NFC first so composed and decomposed accents compare equal downstream.
        let text: String = raw
            .nfc()
            .filter(|c| !c.is_control() || c.is_whitespace())
            .collect();

        // Rule 1
        let text = WHITESPACE_RUN_REGEX.replace_all(&text, " ");
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }

        // Rule 2
        let text = BULLET_GLYPH_REGEX.replace_all(text, "\n$1 ");
        let text = INDENT_MARKER_REGEX.replace_all(&text, "\n$1 ");

        // Rule 3
        let text = NUMBERED_MARKER_REGEX.replace_all(&text, "\n$1 ");

        // Rule 4
        let text = if self.sentence_breaks {
            break_sentences(&text)
        } else {
            text.into_owned()
        };

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Normalize with the default rule set.
pub fn normalize(raw: &str) -> String {
    TextNormalizer::new().normalize(raw)
}

/// Break after `.`, `!` or `?` when the next word is capitalized.
///
/// The period of a `N.` list marker (one to three digits standing alone)
/// is never a sentence end. Other numbers (`in 2023. Then`) are.
fn break_sentences(text: &str) -> String {
    SENTENCE_BREAK_REGEX
        .replace_all(text, |caps: &Captures| {
            let punct_start = caps.get(1).map_or(0, |m| m.start());
            if ends_with_list_marker(&text[..punct_start]) {
                format!("{} {}", &caps[1], &caps[2])
            } else {
                format!("{}\n{}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

/// True when `prefix` ends in a free-standing run of one to three digits.
fn ends_with_list_marker(prefix: &str) -> bool {
    let digits = prefix
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if !(1..=3).contains(&digits) {
        return false;
    }
    prefix[..prefix.len() - digits]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t \r\n"), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(normalize("Hello    world"), "Hello world");
        assert_eq!(normalize("  Hello\n  world  "), "Hello world");
        assert_eq!(normalize("\t\tHello\t\t"), "Hello");
    }

    #[test]
    fn test_break_before_bullets() {
        assert_eq!(
            normalize("Topics • Ownership •Borrowing"),
            "Topics\n• Ownership\n• Borrowing"
        );
        assert_eq!(normalize("▪ first ▪ second"), "▪ first\n▪ second");
    }

    #[test]
    fn test_break_before_indent_marker() {
        assert_eq!(
            normalize("• Memory – stack – heap"),
            "• Memory\n– stack\n– heap"
        );
        // En dash glued to words is punctuation, not a marker
        assert_eq!(normalize("pages 3–5"), "pages 3–5");
    }

    #[test]
    fn test_break_before_numbered_markers() {
        assert_eq!(
            normalize("Steps 1. fetch 2. decode 3. execute"),
            "Steps\n1. fetch\n2. decode\n3. execute"
        );
        // Decimals and years are not list markers
        assert_eq!(normalize("version 2.5 shipped"), "version 2.5 shipped");
    }

    #[test]
    fn test_sentence_resegmentation() {
        assert_eq!(
            normalize("The cache is warm. Reads are fast! Why? Locality."),
            "The cache is warm.\nReads are fast!\nWhy?\nLocality."
        );
        // Lowercase continuation stays on the same line
        assert_eq!(normalize("e.g. this one"), "e.g. this one");
    }

    #[test]
    fn test_numbered_marker_is_not_a_sentence_end() {
        assert_eq!(
            normalize("Agenda 1. Introduction 2. Results"),
            "Agenda\n1. Introduction\n2. Results"
        );
    }

    #[test]
    fn test_year_before_period_ends_sentence() {
        assert_eq!(normalize("Founded in 2023. Then it grew"), "Founded in 2023.\nThen it grew");
        assert_eq!(normalize("Version v2. Next"), "Version v2.\nNext");
        // A list marker keeps its item on the same line
        assert_eq!(normalize("Plan 12. Ship"), "Plan\n12. Ship");
    }

    #[test]
    fn test_sentence_breaks_can_be_disabled() {
        let normalizer = TextNormalizer::new().with_sentence_breaks(false);
        assert_eq!(normalizer.normalize("One. Two."), "One. Two.");
    }

    #[test]
    fn test_control_characters_removed() {
        assert_eq!(normalize("Hel\u{0}lo\u{7} world"), "Hello world");
    }

    #[test]
    fn test_nfc_composition() {
        // "e" + combining acute becomes the single precomposed character
        assert_eq!(normalize("caf\u{65}\u{301}"), "caf\u{e9}");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Plain text",
            "Intro • one •two ▪ three",
            "Steps 1. a 2. b 10. c",
            "It works. Then it fails! Why? Because.",
            "Heap – stack – registers. Next topic • item 1. sub",
            "• leading bullet and trailing •",
            "Mixed\n\n  lines\r\nwith 3. numbered. And More",
            "Agenda 1. Introduction 2. Results",
            "1. 2. x",
            "Founded in 2023. Then it grew",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }
}
