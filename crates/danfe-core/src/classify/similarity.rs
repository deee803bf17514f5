//! Text normalization and page-to-page similarity.

use std::collections::HashSet;

/// Collapse whitespace runs to single spaces, trim and lowercase.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Jaccard similarity of the whitespace token sets of two texts.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

/// Whether `current` repeats or extends `previous`.
///
/// Both inputs are expected to be normalized. An empty previous text is
/// never similar to anything.
pub fn is_similar(current: &str, previous: &str, threshold: f32) -> bool {
    if previous.is_empty() {
        return false;
    }
    if !current.is_empty() && (previous.contains(current) || current.contains(previous)) {
        return true;
    }
    jaccard(previous, current) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Pedido\n\tCRIADO   em  "), "pedido criado em");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard("a b c", "a b c"), 1.0);
        assert_eq!(jaccard("a b", "c d"), 0.0);
        assert_eq!(jaccard("a b c d", "a b"), 0.5);
        assert_eq!(jaccard("", ""), 0.0);
    }

    #[test]
    fn test_containment_counts_as_similar() {
        assert!(is_similar("order 123", "label for order 123 shipped", 0.6));
        assert!(is_similar("label for order 123 shipped", "order 123", 0.6));
    }

    #[test]
    fn test_threshold_applies_to_jaccard() {
        let previous = "a b c d e f g h i j";
        let current = "a b c d e f g h i x";
        // 9 shared tokens out of 11
        assert!(is_similar(current, previous, 0.6));
        assert!(!is_similar("a x y z", previous, 0.6));
    }

    #[test]
    fn test_empty_previous_is_never_similar() {
        assert!(!is_similar("anything", "", 0.0));
    }
}
