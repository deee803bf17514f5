//! PDF reading: page snapshots, pruning and artwork rasterization.

mod document;
mod images;
mod render;
mod text;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::PdfDocument;

use crate::error::PdfError;
use crate::models::page::Page;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Read access to the pages of a source document.
pub trait PageSource {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Snapshot of the page at `index` (0-based).
    fn page(&self, index: usize) -> Option<&Page>;

    /// Render a page at the given resolution.
    fn rasterize(&self, index: usize, dpi: u32) -> Result<DynamicImage>;
}
