//! Line-based parsing of the DANFE item section.
//!
//! The section is read line by line. Lines accumulate in a buffer that is
//! turned into a [`LineItem`] when a new item starts or the section ends.
//! The quantity printed after a `QUANT.` marker applies to the buffered item.

use tracing::trace;

use super::rules::patterns::{is_numeric, CODE_LINE, CODE_WITH_TEXT};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{LineItem, DEFAULT_QUANTITY};

/// Marker preceding the quantity of an item.
const QUANTITY_MARKER: &str = "QUANT.";

/// Largest value accepted as an item sequence number.
const MAX_SEQUENCE_NUMBER: u32 = 50;

/// Line that only carries an item sequence number (`01`, `7`, ...).
pub fn is_sequence_number(line: &str) -> bool {
    is_numeric(line)
        && line.len() <= 2
        && line.parse::<u32>().is_ok_and(|n| n <= MAX_SEQUENCE_NUMBER)
}

/// Line that opens with a product code.
pub fn is_code_line(line: &str) -> bool {
    CODE_LINE.is_match(line)
}

/// Whether `line` opens a new item, given the state of the buffer.
pub fn starts_new_item(line: &str, buffer_is_empty: bool) -> bool {
    buffer_is_empty && (is_sequence_number(line) || is_code_line(line))
}

/// Raw line that announces a quantity on the line after it.
pub fn is_quantity_marker(raw_line: &str) -> bool {
    raw_line.to_uppercase().contains(QUANTITY_MARKER)
}

/// Parser for item sections.
#[derive(Debug, Clone)]
pub struct ItemParser {
    header_tokens: Vec<String>,
}

impl ItemParser {
    pub fn new(header_tokens: Vec<String>) -> Self {
        Self { header_tokens }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.header_tokens.clone())
    }

    fn is_skipped(&self, line: &str) -> bool {
        line.is_empty() || self.header_tokens.iter().any(|t| t == line)
    }

    /// Parse an item section. Its first line is the section header and is
    /// not considered.
    pub fn parse(&self, section: &str) -> Vec<LineItem> {
        let lines: Vec<&str> = section.trim().split('\n').collect();
        let mut items = Vec::new();
        let mut buffer: Vec<String> = Vec::new();
        let mut quantity = DEFAULT_QUANTITY.to_string();

        for pos in 1..lines.len() {
            let line = lines[pos].trim();
            if self.is_skipped(line) {
                continue;
            }

            if pos >= 2 && is_quantity_marker(lines[pos - 1]) {
                if is_numeric(line) {
                    trace!(quantity = line, "Quantity found");
                    quantity = line.to_string();
                    continue;
                }
                if let Some(next) = lines.get(pos + 1).map(|l| l.trim()) {
                    if is_numeric(next) {
                        trace!(quantity = next, "Quantity found on following line");
                        quantity = next.to_string();
                    }
                }
            }

            if starts_new_item(line, buffer.is_empty()) {
                if let Some(item) = flush(&mut buffer, &quantity) {
                    items.push(item);
                }
                quantity = DEFAULT_QUANTITY.to_string();

                // Sequence numbers only delimit items
                if is_sequence_number(line) {
                    continue;
                }
            }

            buffer.push(line.to_string());
        }

        if let Some(item) = flush(&mut buffer, &quantity) {
            items.push(item);
        }

        items
    }
}

impl Default for ItemParser {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Turn the buffered lines into an item and clear the buffer.
///
/// The first token of the first line is the product code; the remainder of
/// that line and all following lines form the description.
fn flush(buffer: &mut Vec<String>, quantity: &str) -> Option<LineItem> {
    if buffer.is_empty() {
        return None;
    }
    let lines = std::mem::take(buffer);

    let (code, first_text) = match CODE_WITH_TEXT.captures(&lines[0]) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (lines[0].clone(), None),
    };

    let description = first_text
        .into_iter()
        .chain(lines[1..].iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");

    let item = LineItem::new(code, description, quantity);
    if item.is_none() {
        trace!(first_line = %lines[0], "Discarded item that fails the code/description gate");
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequence_number() {
        assert!(is_sequence_number("01"));
        assert!(is_sequence_number("50"));
        assert!(!is_sequence_number("51"));
        assert!(!is_sequence_number("100"));
        assert!(!is_sequence_number("A1"));
    }

    #[test]
    fn test_new_item_only_on_empty_buffer() {
        assert!(starts_new_item("01", true));
        assert!(starts_new_item("ABC12345 Shoe", true));
        assert!(!starts_new_item("ABC12345 Shoe", false));
        assert!(!starts_new_item("Blue Shoe", true));
    }

    #[test]
    fn test_single_item_with_quantity() {
        let section = "ITEM\n01\nABC12345 Blue Shoe Size 42\nQUANT.\n3";
        let items = ItemParser::default().parse(section);
        assert_eq!(
            items,
            vec![LineItem::new("ABC12345", "Blue Shoe Size 42", "3").unwrap()]
        );
    }

    #[test]
    fn test_code_on_its_own_line() {
        let section = "ITEM\nCÓDIGO\nDESCRIÇÃO\nXYZ98765\nTênis Casual\nPreto";
        let items = ItemParser::default().parse(section);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_code, "XYZ98765");
        assert_eq!(items[0].description, "Tênis Casual Preto");
        assert_eq!(items[0].quantity, "1");
    }

    #[test]
    fn test_quantity_on_line_after_marker_value() {
        // the marker is followed by a unit label, the value comes after it
        let section = "ITEM\nABC12345 Shoe\nQUANT.\nun\n4";
        let items = ItemParser::default().parse(section);
        assert_eq!(items[0].quantity, "4");
        assert_eq!(items[0].description, "Shoe un 4");
    }

    #[test]
    fn test_short_code_is_discarded() {
        let items = ItemParser::default().parse("ITEM\nAB1 Shoe");
        assert!(items.is_empty());
    }

    #[test]
    fn test_code_without_description_is_discarded() {
        let items = ItemParser::default().parse("ITEM\nABC12345");
        assert!(items.is_empty());
    }

    #[test]
    fn test_header_tokens_and_blank_lines_are_skipped() {
        let section = "ITEM\n\nCONTEÚDO\nATRIBUTOS\nABC12345 Meia\n   \nAlgodão";
        let items = ItemParser::default().parse(section);
        assert_eq!(items[0].description, "Meia Algodão");
    }

    #[test]
    fn test_header_tokens_match_exact_case() {
        let section = "ITEM\nABC12345 Meia\nDescrição\nDESCRIÇÃO";
        let items = ItemParser::default().parse(section);
        assert_eq!(items[0].description, "Meia Descrição");
    }

    #[test]
    fn test_sequence_numbers_inside_open_item_are_kept() {
        // a boundary needs an empty buffer, so the second item joins the first
        let section = "ITEM\n01\nABC12345 Blue Shoe\n02\nDEF67890 Red Sock";
        let items = ItemParser::default().parse(section);
        assert_eq!(
            items,
            vec![LineItem::new("ABC12345", "Blue Shoe 02 DEF67890 Red Sock", "1").unwrap()]
        );
    }

    #[test]
    fn test_leading_sequence_numbers_never_become_codes() {
        let section = "ITEM\n01\n02\nABC12345 Blue Shoe\nQUANT.\n2";
        let items = ItemParser::default().parse(section);
        assert_eq!(
            items,
            vec![LineItem::new("ABC12345", "Blue Shoe", "2").unwrap()]
        );
    }

    #[test]
    fn test_empty_section() {
        assert!(ItemParser::default().parse("").is_empty());
        assert!(ItemParser::default().parse("ITEM").is_empty());
    }
}
