//! Description cleanup and line wrapping for the item table.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::models::config::CorrectionTable;

lazy_static! {
    /// Square glyphs left over from checkbox-like decorations.
    static ref SPECIAL_GLYPHS: Regex = Regex::new(r"[■□▪▫]").unwrap();
}

/// Applies the glyph cleanup and word-split corrections to descriptions.
#[derive(Debug, Clone)]
pub struct DescriptionNormalizer {
    corrections: Vec<(Regex, String)>,
}

impl DescriptionNormalizer {
    pub fn new(table: &CorrectionTable) -> Self {
        let corrections = table
            .entries
            .iter()
            .filter(|c| !c.fragments.is_empty())
            .filter_map(|c| {
                let pattern = format!(
                    r"(?i)\b{}\b",
                    c.fragments
                        .iter()
                        .map(|f| regex::escape(f))
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                );
                match Regex::new(&pattern) {
                    Ok(re) => Some((re, c.replacement.clone())),
                    Err(e) => {
                        warn!(replacement = %c.replacement, error = %e, "Skipping correction");
                        None
                    }
                }
            })
            .collect();

        Self { corrections }
    }

    /// Normalize a description.
    ///
    /// Glyphs are stripped before whitespace is collapsed so the result is
    /// stable under repeated application.
    pub fn normalize(&self, text: &str) -> String {
        let stripped = SPECIAL_GLYPHS.replace_all(text, "");
        let mut result = collapse_whitespace(&stripped);
        for (pattern, replacement) in &self.corrections {
            result = pattern
                .replace_all(&result, regex::NoExpand(replacement))
                .into_owned();
        }
        result
    }
}

impl Default for DescriptionNormalizer {
    fn default() -> Self {
        Self::new(&CorrectionTable::default())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text shown in the description cell of an item.
pub fn display_text(code: &str, description: &str) -> String {
    format!("Código: {code}\n{description}")
}

/// Wrap text at `width` characters.
///
/// Each paragraph is wrapped on its own. Words are never broken unless a
/// single word is longer than `width`.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let len = word.chars().count();
            if current.is_empty() {
                current = place_word(word, width, &mut lines);
            } else if current.chars().count() + 1 + len <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current = place_word(word, width, &mut lines);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Start a line with `word`, hard-splitting it when it does not fit.
/// Returns the unfinished last chunk.
fn place_word(word: &str, width: usize, lines: &mut Vec<String>) -> String {
    let chars: Vec<char> = word.chars().collect();
    let mut chunks = chars.chunks(width).map(|c| c.iter().collect::<String>());
    let mut last = chunks.next().unwrap_or_default();
    for chunk in chunks {
        lines.push(std::mem::replace(&mut last, chunk));
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_corrections_are_case_insensitive() {
        let normalizer = DescriptionNormalizer::default();
        assert_eq!(
            normalizer.normalize("Tênis u   nissex Skat ista Preto"),
            "Tênis Unissex Skatista Preto"
        );
    }

    #[test]
    fn test_corrections_respect_word_boundaries() {
        let normalizer = DescriptionNormalizer::default();
        assert_eq!(normalizer.normalize("Super Linha"), "Super Linha");
        assert_eq!(normalizer.normalize("XSu per"), "XSu per");
    }

    #[test]
    fn test_glyphs_and_whitespace() {
        let normalizer = DescriptionNormalizer::new(&CorrectionTable::empty());
        assert_eq!(normalizer.normalize("  ■ Meia\t□ Branca  "), "Meia Branca");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = DescriptionNormalizer::default();
        for input in ["■ Dia  a Dia ▪ Cas ual", "Tê nis Ma sculino", "a ■ b"] {
            let once = normalizer.normalize(input);
            assert_eq!(normalizer.normalize(&once), once);
        }
    }

    #[test]
    fn test_wrap_keeps_words_whole() {
        let lines = wrap_text("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 11));
    }

    #[test]
    fn test_wrap_splits_overlong_word() {
        assert_eq!(wrap_text("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn test_wrap_preserves_paragraphs() {
        let text = display_text("ABC12345", "Blue Shoe");
        assert_eq!(wrap_text(&text, 112), vec!["Código: ABC12345", "Blue Shoe"]);
    }

    #[test]
    fn test_wrap_counts_characters_not_bytes() {
        assert_eq!(wrap_text("ção ção", 7), vec!["ção ção"]);
    }
}
