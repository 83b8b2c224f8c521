//! Typographic style sheet: one [`TextStyle`] per [`StyleRole`].
//!
//! In simple mode a single face family applies to every role (code
//! always stays monospaced). Extended mode overrides the family per role.

use crate::config::{ConvertConfig, FontFamily};
use serde::{Deserialize, Serialize};

/// The role a piece of text plays in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleRole {
    Title,
    Heading1,
    Heading2,
    Heading3,
    Body,
    ListItem,
    Emphasis,
    Code,
    Caption,
}

impl StyleRole {
    pub const ALL: [StyleRole; 9] = [
        StyleRole::Title,
        StyleRole::Heading1,
        StyleRole::Heading2,
        StyleRole::Heading3,
        StyleRole::Body,
        StyleRole::ListItem,
        StyleRole::Emphasis,
        StyleRole::Code,
        StyleRole::Caption,
    ];

    /// Heading role for a markup level; levels past 3 use heading 3.
    pub fn heading(level: u8) -> Self {
        match level {
            0 | 1 => StyleRole::Heading1,
            2 => StyleRole::Heading2,
            _ => StyleRole::Heading3,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

/// Typographic attributes of one role. Sizes are in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub size: f32,
    /// Baseline-to-baseline distance.
    pub leading: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub left_indent: f32,
    pub alignment: Alignment,
}

impl TextStyle {
    fn new(family: FontFamily, size: f32) -> Self {
        Self {
            family,
            bold: false,
            italic: false,
            size,
            leading: size * 1.2,
            space_before: 0.0,
            space_after: 0.0,
            left_indent: 0.0,
            alignment: Alignment::Left,
        }
    }

    fn spacing(mut self, before: f32, after: f32) -> Self {
        self.space_before = before;
        self.space_after = after;
        self
    }
}

/// Styles for every role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    styles: [TextStyle; 9],
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self::uniform(FontFamily::default())
    }
}

impl StyleSheet {
    /// Simple mode: one family for every role except code.
    pub fn uniform(family: FontFamily) -> Self {
        let title = TextStyle {
            bold: true,
            alignment: Alignment::Center,
            ..TextStyle::new(family, 20.0).spacing(0.0, 20.0)
        };
        let heading = |size: f32, space: f32| TextStyle {
            bold: true,
            ..TextStyle::new(family, size).spacing(space, space)
        };
        let list_item = TextStyle {
            left_indent: 20.0,
            ..TextStyle::new(family, 11.0).spacing(0.0, 4.0)
        };
        let emphasis = TextStyle {
            italic: true,
            ..TextStyle::new(family, 11.0).spacing(0.0, 6.0)
        };
        let code = TextStyle {
            leading: 12.0,
            ..TextStyle::new(FontFamily::Courier, 10.0).spacing(0.0, 8.0)
        };
        let caption = TextStyle {
            italic: true,
            alignment: Alignment::Center,
            ..TextStyle::new(family, 9.0).spacing(4.0, 6.0)
        };

        Self {
            styles: [
                title,
                heading(16.0, 12.0),
                heading(14.0, 10.0),
                heading(12.0, 8.0),
                TextStyle::new(family, 11.0).spacing(0.0, 6.0),
                list_item,
                emphasis,
                code,
                caption,
            ],
        }
    }

    /// Build the sheet a config asks for.
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::uniform(config.font_family)
    }

    /// Extended mode: give one role its own family.
    pub fn with_role_face(mut self, role: StyleRole, family: FontFamily) -> Self {
        self.styles[role.index()].family = family;
        self
    }

    /// Extended mode shorthand for the title and all heading roles.
    pub fn with_heading_face(self, family: FontFamily) -> Self {
        self.with_role_face(StyleRole::Title, family)
            .with_role_face(StyleRole::Heading1, family)
            .with_role_face(StyleRole::Heading2, family)
            .with_role_face(StyleRole::Heading3, family)
    }

    pub fn get(&self, role: StyleRole) -> &TextStyle {
        &self.styles[role.index()]
    }

    pub fn get_mut(&mut self, role: StyleRole) -> &mut TextStyle {
        &mut self.styles[role.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_applies_family_except_code() {
        let sheet = StyleSheet::uniform(FontFamily::Helvetica);
        for role in StyleRole::ALL {
            let expected = if role == StyleRole::Code {
                FontFamily::Courier
            } else {
                FontFamily::Helvetica
            };
            assert_eq!(sheet.get(role).family, expected, "{:?}", role);
        }
    }

    #[test]
    fn test_heading_sizes_decrease() {
        let sheet = StyleSheet::default();
        let h1 = sheet.get(StyleRole::Heading1).size;
        let h2 = sheet.get(StyleRole::Heading2).size;
        let h3 = sheet.get(StyleRole::Heading3).size;
        assert!(h1 > h2 && h2 > h3);
        assert!(h3 > sheet.get(StyleRole::Body).size);
    }

    #[test]
    fn test_extended_mode_overrides_one_role() {
        let sheet = StyleSheet::uniform(FontFamily::Times).with_heading_face(FontFamily::Helvetica);
        assert_eq!(sheet.get(StyleRole::Heading2).family, FontFamily::Helvetica);
        assert_eq!(sheet.get(StyleRole::Body).family, FontFamily::Times);
    }

    #[test]
    fn test_heading_role_for_level() {
        assert_eq!(StyleRole::heading(1), StyleRole::Heading1);
        assert_eq!(StyleRole::heading(3), StyleRole::Heading3);
        assert_eq!(StyleRole::heading(6), StyleRole::Heading3);
    }

    #[test]
    fn test_list_items_are_indented() {
        let sheet = StyleSheet::default();
        assert!(sheet.get(StyleRole::ListItem).left_indent > 0.0);
        assert!(sheet.get(StyleRole::Emphasis).italic);
        assert_eq!(sheet.get(StyleRole::Title).alignment, Alignment::Center);
    }
}
