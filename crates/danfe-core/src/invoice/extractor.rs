//! Stride scan over pruned pages producing invoice records.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::items::ItemParser;
use super::rules::{validate_access_key, AccessKeyExtractor, FieldExtractor};
use super::ItemExtractor;
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{key_prefix, InvoiceRecord, ACCESS_KEY_DIGITS};
use crate::models::page::Page;

/// Pages consumed per invoice: the DANFE page and its label page.
pub const PAGE_STRIDE: usize = 2;

/// What happened to one scanned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PageOutcome {
    /// No DANFE marker; the scan moved on by one page.
    NotDanfe,
    /// No anchor followed by enough digits.
    MissingAccessKey,
    /// No item section anchor.
    MissingItemSection,
    /// The item section produced no valid item.
    NoValidItems,
    /// A record was produced.
    Extracted {
        items: usize,
        merged_continuation: bool,
    },
}

/// Outcome of one scanned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// Page index (0-based) in the scanned sequence.
    pub page: usize,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

/// Records plus the per-page outcomes that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub records: Vec<InvoiceRecord>,
    pub pages: Vec<PageExtraction>,
}

/// Extracts one record per DANFE page, scanning two pages at a time.
#[derive(Debug, Clone)]
pub struct DanfeItemExtractor {
    keys: AccessKeyExtractor,
    item_anchors: Vec<String>,
    parser: ItemParser,
}

impl DanfeItemExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            keys: AccessKeyExtractor::from_config(config),
            item_anchors: config.item_anchors.clone(),
            parser: ItemParser::from_config(config),
        }
    }

    /// Text from the first item anchor (in anchor order) to the end of the page.
    fn item_section<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.item_anchors
            .iter()
            .find_map(|anchor| text.find(anchor.as_str()))
            .map(|start| &text[start..])
    }

    fn extract_page(
        &self,
        pages: &[Page],
        index: usize,
        records: &mut Vec<InvoiceRecord>,
    ) -> PageOutcome {
        let page = &pages[index];
        let page_number = page.index + 1;

        let Some(key) = self.keys.extract(&page.text) else {
            warn!(page = page_number, "Access key not found");
            return PageOutcome::MissingAccessKey;
        };
        let access_key = key.value;
        let prefix = key_prefix(&access_key);
        info!(page = page_number, key_prefix = prefix, "Access key found");

        if access_key.len() == ACCESS_KEY_DIGITS && !validate_access_key(&access_key) {
            debug!(page = page_number, key_prefix = prefix, "Access key check digit mismatch");
        }

        let Some(section) = self.item_section(&page.text) else {
            warn!(page = page_number, "Item section not found");
            return PageOutcome::MissingItemSection;
        };
        let mut section = section.to_string();

        let continuation = pages
            .get(index + 1)
            .filter(|next| !next.has_images() && !next.text.is_empty() && !next.looks_like_danfe());
        if let Some(next) = continuation {
            info!(page = page_number, continuation = next.index + 1, "Including continuation page");
            section.push('\n');
            section.push_str(&next.text);
        }

        let items = self.parser.parse(&section);
        if items.is_empty() {
            warn!(page = page_number, "No valid items extracted");
            return PageOutcome::NoValidItems;
        }

        info!(page = page_number, items = items.len(), "Items extracted");
        let outcome = PageOutcome::Extracted {
            items: items.len(),
            merged_continuation: continuation.is_some(),
        };
        records.push(InvoiceRecord::new(access_key, items));
        outcome
    }
}

impl Default for DanfeItemExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl ItemExtractor for DanfeItemExtractor {
    fn extract(&self, pages: &[Page]) -> Extraction {
        let mut extraction = Extraction::default();
        let mut index = 0;

        while index < pages.len() {
            let page = &pages[index];

            if !page.looks_like_danfe() {
                debug!(page = page.index + 1, "No DANFE marker, skipping");
                extraction.pages.push(PageExtraction {
                    page: page.index,
                    outcome: PageOutcome::NotDanfe,
                });
                index += 1;
                continue;
            }

            let outcome = self.extract_page(pages, index, &mut extraction.records);
            extraction.pages.push(PageExtraction {
                page: page.index,
                outcome,
            });
            index += PAGE_STRIDE;
        }

        info!(records = extraction.records.len(), "Extraction finished");
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::LineItem;
    use pretty_assertions::assert_eq;

    const KEY: &str = "12345678901234567890123456789012345678901234";

    fn danfe(index: usize, body: &str) -> Page {
        Page::new(index, 595.0, 842.0).with_text(format!("DANFE\nCHAVE DE ACESSO {KEY}\n{body}"))
    }

    fn label(index: usize) -> Page {
        Page::new(index, 595.0, 842.0).with_images(1)
    }

    fn scanned(extraction: &Extraction) -> Vec<usize> {
        extraction.pages.iter().map(|p| p.page).collect()
    }

    #[test]
    fn test_scenario_a_record() {
        let page = Page::new(0, 595.0, 842.0).with_text(format!(
            "DANFE ... CHAVE DE ACESSO {KEY} ... ITEM\n01\nABC12345 Blue Shoe Size 42\nQUANT.\n3"
        ));
        let extraction = DanfeItemExtractor::default().extract(&[page, label(1)]);

        assert_eq!(
            extraction.records,
            vec![InvoiceRecord::new(
                KEY,
                vec![LineItem::new("ABC12345", "Blue Shoe Size 42", "3").unwrap()]
            )]
        );
    }

    #[test]
    fn test_stride_after_danfe_page() {
        let pages = vec![
            danfe(0, "ITEM\nAAA11111 First"),
            label(1),
            danfe(2, "ITEM\nBBB22222 Second"),
            label(3),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert_eq!(scanned(&extraction), vec![0, 2]);
        assert_eq!(extraction.records.len(), 2);
    }

    #[test]
    fn test_stride_is_two_even_when_extraction_fails() {
        let pages = vec![
            Page::new(0, 595.0, 842.0).with_text("DANFE sem chave"),
            danfe(1, "ITEM\nAAA11111 Skipped by the stride"),
            danfe(2, "ITEM\nBBB22222 Second"),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert_eq!(scanned(&extraction), vec![0, 2]);
        assert_eq!(extraction.pages[0].outcome, PageOutcome::MissingAccessKey);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].items[0].product_code, "BBB22222");
    }

    #[test]
    fn test_non_danfe_pages_advance_by_one() {
        let pages = vec![
            Page::new(0, 595.0, 842.0).with_text("etiqueta"),
            danfe(1, "ITEM\nAAA11111 First"),
            label(2),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert_eq!(scanned(&extraction), vec![0, 1]);
        assert_eq!(extraction.pages[0].outcome, PageOutcome::NotDanfe);
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn test_missing_item_section() {
        let extraction = DanfeItemExtractor::default().extract(&[danfe(0, "sem itens")]);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.pages[0].outcome, PageOutcome::MissingItemSection);
    }

    #[test]
    fn test_invalid_items_yield_no_record() {
        let extraction = DanfeItemExtractor::default().extract(&[danfe(0, "ITEM\nAB1 curto")]);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.pages[0].outcome, PageOutcome::NoValidItems);
    }

    #[test]
    fn test_continuation_page_is_merged() {
        let pages = vec![
            danfe(0, "ITEM\nAAA11111 Camiseta"),
            Page::new(1, 595.0, 842.0).with_text("Algodão Azul"),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert_eq!(extraction.records[0].items[0].description, "Camiseta Algodão Azul");
        assert_eq!(
            extraction.pages[0].outcome,
            PageOutcome::Extracted {
                items: 1,
                merged_continuation: true
            }
        );
    }

    #[test]
    fn test_image_page_is_not_merged() {
        let pages = vec![
            danfe(0, "ITEM\nAAA11111 Camiseta"),
            Page::new(1, 595.0, 842.0).with_text("Algodão Azul").with_images(1),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert_eq!(extraction.records[0].items[0].description, "Camiseta");
    }

    #[test]
    fn test_next_danfe_page_is_not_merged() {
        let pages = vec![
            danfe(0, "ITEM\nAAA11111 Camiseta"),
            Page::new(1, 595.0, 842.0).with_text("DANFE\nITEM\nZZZ99999 Outra nota"),
        ];
        let extraction = DanfeItemExtractor::default().extract(&pages);

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].items[0].description, "Camiseta");
        assert_eq!(
            extraction.pages[0].outcome,
            PageOutcome::Extracted {
                items: 1,
                merged_continuation: false
            }
        );
    }

    #[test]
    fn test_no_danfe_pages_yield_nothing() {
        let pages = vec![label(0), Page::new(1, 595.0, 842.0).with_text("etiqueta")];
        let extraction = DanfeItemExtractor::default().extract(&pages);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.pages.len(), 2);
    }

    #[test]
    fn test_records_never_carry_short_keys() {
        let page = Page::new(0, 595.0, 842.0)
            .with_text(format!("DANFE\nCHAVE DE ACESSO {}\nITEM\nAAA11111 Camiseta", &KEY[..39]));
        let extraction = DanfeItemExtractor::default().extract(&[page]);
        assert!(extraction.records.is_empty());
    }
}
