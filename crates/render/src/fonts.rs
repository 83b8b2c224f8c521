//! The standard Type 1 faces: selection, advance widths and WinAnsi encoding.
//!
//! `printpdf` embeds nothing for the built-in faces and exposes no metrics
//! for them, so line breaking measures against the AFM advance widths kept
//! here. Text is narrowed to WinAnsi before measuring; [`decode`] turns the
//! measured bytes back into the string handed to the writer.

use printpdf::BuiltinFont;
use textbook_core::{FontFamily, TextStyle};

/// Substitute for characters WinAnsiEncoding cannot express.
pub const REPLACEMENT: u8 = b'?';

/// One of the base-14 faces used by the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl Face {
    pub fn select(family: FontFamily, bold: bool, italic: bool) -> Self {
        match (family, bold, italic) {
            (FontFamily::Times, false, false) => Face::TimesRoman,
            (FontFamily::Times, true, false) => Face::TimesBold,
            (FontFamily::Times, false, true) => Face::TimesItalic,
            (FontFamily::Times, true, true) => Face::TimesBoldItalic,
            (FontFamily::Helvetica, false, false) => Face::Helvetica,
            (FontFamily::Helvetica, true, false) => Face::HelveticaBold,
            (FontFamily::Helvetica, false, true) => Face::HelveticaOblique,
            (FontFamily::Helvetica, true, true) => Face::HelveticaBoldOblique,
            (FontFamily::Courier, false, false) => Face::Courier,
            (FontFamily::Courier, true, false) => Face::CourierBold,
            (FontFamily::Courier, false, true) => Face::CourierOblique,
            (FontFamily::Courier, true, true) => Face::CourierBoldOblique,
        }
    }

    pub fn for_style(style: &TextStyle) -> Self {
        Self::select(style.family, style.bold, style.italic)
    }

    /// The same family with bold switched on.
    pub fn bold(self) -> Self {
        match self {
            Face::TimesRoman => Face::TimesBold,
            Face::TimesItalic => Face::TimesBoldItalic,
            Face::Helvetica => Face::HelveticaBold,
            Face::HelveticaOblique => Face::HelveticaBoldOblique,
            Face::Courier => Face::CourierBold,
            Face::CourierOblique => Face::CourierBoldOblique,
            other => other,
        }
    }

    /// The matching `printpdf` built-in font.
    pub fn builtin(self) -> BuiltinFont {
        match self {
            Face::TimesRoman => BuiltinFont::TimesRoman,
            Face::TimesBold => BuiltinFont::TimesBold,
            Face::TimesItalic => BuiltinFont::TimesItalic,
            Face::TimesBoldItalic => BuiltinFont::TimesBoldItalic,
            Face::Helvetica => BuiltinFont::Helvetica,
            Face::HelveticaBold => BuiltinFont::HelveticaBold,
            Face::HelveticaOblique => BuiltinFont::HelveticaOblique,
            Face::HelveticaBoldOblique => BuiltinFont::HelveticaBoldOblique,
            Face::Courier => BuiltinFont::Courier,
            Face::CourierBold => BuiltinFont::CourierBold,
            Face::CourierOblique => BuiltinFont::CourierOblique,
            Face::CourierBoldOblique => BuiltinFont::CourierBoldOblique,
        }
    }

    fn widths(self) -> Option<&'static [u16; 95]> {
        match self {
            Face::TimesRoman => Some(&TIMES_ROMAN),
            Face::TimesBold => Some(&TIMES_BOLD),
            Face::TimesItalic => Some(&TIMES_ITALIC),
            Face::TimesBoldItalic => Some(&TIMES_BOLD_ITALIC),
            Face::Helvetica | Face::HelveticaOblique => Some(&HELVETICA),
            Face::HelveticaBold | Face::HelveticaBoldOblique => Some(&HELVETICA_BOLD),
            _ => None,
        }
    }

    /// Advance width of one encoded byte, in thousandths of the font size.
    pub fn glyph_width(self, code: u8) -> u16 {
        let Some(widths) = self.widths() else {
            return 600;
        };
        match code {
            32..=126 => widths[usize::from(code - 32)],
            // bullet
            0x95 => 350,
            // endash, emdash, ellipsis
            0x96 => widths[usize::from(b'n' - 32)],
            0x97 | 0x85 => 1000,
            // curly quotes follow the straight ones
            0x91 | 0x92 => widths[usize::from(b'\'' - 32)].max(250),
            0x93 | 0x94 => widths[usize::from(b'"' - 32)],
            // Latin-1 letters are close to their base letters
            0xC0..=0xDE => widths[usize::from(b'O' - 32)],
            0xDF..=0xFF => widths[usize::from(b'o' - 32)],
            _ => widths[usize::from(b'o' - 32)],
        }
    }

    /// Width of encoded text at `size`, in points.
    pub fn measure(self, encoded: &[u8], size: f32) -> f32 {
        let units: u32 = encoded.iter().map(|&c| u32::from(self.glyph_width(c))).sum();
        units as f32 * size / 1000.0
    }

    /// Width of a string at `size`, in points.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        self.measure(&encode(text), size)
    }
}

/// The 0x80-0x9F block of WinAnsiEncoding.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

/// Encode text to WinAnsiEncoding bytes.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

/// Map WinAnsi bytes back to text. Every byte [`encode`] produces survives
/// the round trip.
pub fn decode(encoded: &[u8]) -> String {
    encoded
        .iter()
        .map(|&code| match code {
            0x20..=0x7E | 0xA0..=0xFF => char::from(code),
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|(c, _)| *c == code)
                .map_or(char::from(REPLACEMENT), |(_, ch)| *ch),
        })
        .collect()
}

fn encode_char(c: char) -> u8 {
    match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        // slide bullet glyphs collapse onto the one WinAnsi bullet
        '◦' | '▪' | '▫' | '●' | '○' | '■' | '□' | '►' | '▸' | '▹' | '➢' | '➤' | '❖' => 0x95,
        '‐' | '‑' | '‒' | '−' => b'-',
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(_, ch)| *ch == c)
            .map_or(REPLACEMENT, |(code, _)| *code),
    }
}

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[rustfmt::skip]
static TIMES_ITALIC: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_ITALIC: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722,
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500,
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500,
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];
