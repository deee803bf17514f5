//! Regex patterns for item section parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A line opening with an alphanumeric product code of at least 5 characters.
    pub static ref CODE_LINE: Regex = Regex::new(r"^[A-Za-z0-9]{5,}").unwrap();

    /// A code token followed by the start of the description on the same line.
    pub static ref CODE_WITH_TEXT: Regex = Regex::new(r"^(\S+)\s+(\S.*)$").unwrap();
}

/// Non-empty and ASCII digits only.
pub fn is_numeric(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_line() {
        assert!(CODE_LINE.is_match("ABC12345 Blue Shoe"));
        assert!(CODE_LINE.is_match("12345"));
        assert!(!CODE_LINE.is_match("AB-12345"));
        assert!(!CODE_LINE.is_match("Blue Shoe"));
    }

    #[test]
    fn test_code_with_text() {
        let caps = CODE_WITH_TEXT.captures("ABC12345 Blue Shoe Size 42").unwrap();
        assert_eq!(&caps[1], "ABC12345");
        assert_eq!(&caps[2], "Blue Shoe Size 42");
        assert!(CODE_WITH_TEXT.captures("ABC12345").is_none());
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("03"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("3,0"));
        assert!(!is_numeric("٣"));
    }
}
