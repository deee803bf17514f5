//! Invoice record extraction from pruned pages.

pub mod extractor;
pub mod items;
pub mod rules;

pub use extractor::{DanfeItemExtractor, Extraction, PageExtraction, PageOutcome, PAGE_STRIDE};
pub use items::ItemParser;

use crate::models::page::Page;

/// Trait for invoice record extractors.
pub trait ItemExtractor {
    /// Extract invoice records from a page sequence, in page order.
    fn extract(&self, pages: &[Page]) -> Extraction;
}
