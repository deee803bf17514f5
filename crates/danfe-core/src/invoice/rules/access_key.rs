//! Access key (chave de acesso) extraction and validation.

use super::{ExtractionMatch, FieldExtractor};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::ACCESS_KEY_DIGITS;

/// Finds the access key following one of a list of anchors.
#[derive(Debug, Clone)]
pub struct AccessKeyExtractor {
    anchors: Vec<String>,
    min_digits: usize,
}

impl AccessKeyExtractor {
    pub fn new(anchors: Vec<String>, min_digits: usize) -> Self {
        Self { anchors, min_digits }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.key_anchors.clone(), config.min_key_digits)
    }
}

impl Default for AccessKeyExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl FieldExtractor for AccessKeyExtractor {
    type Output = ExtractionMatch<String>;

    /// Anchors are tried in order. For each, the text after its first
    /// occurrence is trimmed and cut at the next line break; the digits of
    /// that line are accepted when there are enough of them.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        for anchor in &self.anchors {
            let Some(position) = text.find(anchor.as_str()) else {
                continue;
            };

            let rest = text[position + anchor.len()..].trim();
            let line = rest.split('\n').next().unwrap_or_default();
            let digits: String = line.chars().filter(|c| c.is_ascii_digit()).collect();

            if digits.len() >= self.min_digits {
                return Some(ExtractionMatch::new(digits, anchor.as_str(), position));
            }
        }
        None
    }
}

/// Validate the modulo-11 check digit of a 44-digit access key.
///
/// Weights 2 to 9 are applied cyclically from the rightmost of the first
/// 43 digits; a remainder below 2 gives check digit 0.
pub fn validate_access_key(key: &str) -> bool {
    let digits: Vec<u32> = key.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != ACCESS_KEY_DIGITS || key.len() != ACCESS_KEY_DIGITS {
        return false;
    }

    let sum: u32 = digits[..43]
        .iter()
        .rev()
        .zip((2..=9).cycle())
        .map(|(d, w)| d * w)
        .sum();

    let remainder = sum % 11;
    let check = if remainder < 2 { 0 } else { 11 - remainder };
    check == digits[43]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "12345678901234567890123456789012345678901234";

    #[test]
    fn test_key_on_anchor_line() {
        let text = format!("DANFE ... CHAVE DE ACESSO {KEY} ... ITEM\n01");
        let found = AccessKeyExtractor::default().extract(&text).unwrap();
        assert_eq!(found.value, KEY);
        assert_eq!(found.anchor, "CHAVE DE ACESSO");
    }

    #[test]
    fn test_key_on_following_line_with_separators() {
        let text = "CHAVE DE ACESSO\n3524 0612 3456 7800 0190 5500 1000 0123 4512 3456 7890\nOUTRO";
        let found = AccessKeyExtractor::default().extract(text).unwrap();
        assert_eq!(found.value, "35240612345678000190550010000123451234567890");
    }

    #[test]
    fn test_short_key_falls_through_to_next_anchor() {
        let text = format!("CHAVE DE ACESSO: 123\nCHAVE ACESSO {KEY}");
        let found = AccessKeyExtractor::default().extract(&text).unwrap();
        assert_eq!(found.anchor, "CHAVE ACESSO");
        assert_eq!(found.value, KEY);
    }

    #[test]
    fn test_truncated_key_is_rejected() {
        let text = format!("CHAVE DE ACESSO {}", &KEY[..30]);
        assert!(AccessKeyExtractor::default().extract(&text).is_none());
        assert!(AccessKeyExtractor::default().extract("no anchor here").is_none());
    }

    #[test]
    fn test_check_digit() {
        assert!(validate_access_key("35240612345678000190550010000123451234567891"));
        assert!(!validate_access_key("35240612345678000190550010000123451234567890"));
        assert!(!validate_access_key("123"));
    }
}
