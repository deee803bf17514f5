//! Page measurements and the individual drop rules.
//!
//! Every rule is a plain function over a normalized page text and/or its
//! [`PageMetrics`], so each can be exercised on its own.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::similarity::is_similar;
use crate::models::config::ClassifierConfig;
use crate::models::page::{BBox, Page};

lazy_static! {
    /// A letter, two digits, then 6 to 10 alphanumerics (normalized text).
    static ref PRODUCT_CODE_FRAGMENT: Regex = Regex::new(r"[a-z]\d{2}[a-z0-9]{6,10}").unwrap();
}

/// Geometric signals of a page, computed over its qualifying text blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Number of qualifying blocks.
    pub block_count: usize,
    /// Lowest block bottom edge over page height.
    pub bottom_ratio: f32,
    /// Rightmost block edge over page width.
    pub right_ratio: f32,
    /// Number of occupied vertical bands.
    pub vertical_bands: usize,
    /// Number of occupied horizontal columns.
    pub horizontal_columns: usize,
    /// Sum of block areas over page area.
    pub density: f32,
    /// Distance between the highest and lowest block edge over page height.
    pub vertical_spread: f32,
}

impl PageMetrics {
    /// Measure a page. Returns `None` when no block qualifies.
    ///
    /// A block qualifies when it has non-blank text and covers at least the
    /// configured fraction of the page area.
    pub fn measure(page: &Page, config: &ClassifierConfig) -> Option<Self> {
        let min_area = config.noise_area_ratio * page.area();
        let blocks: Vec<BBox> = page
            .blocks
            .iter()
            .filter(|b| !b.text.trim().is_empty() && b.bbox.area() >= min_area)
            .map(|b| b.bbox)
            .collect();

        if blocks.is_empty() || page.width <= 0.0 || page.height <= 0.0 {
            return None;
        }

        let (w, h) = (page.width, page.height);
        let bands = config.vertical_bands.max(1);
        let columns = config.horizontal_columns.max(1);

        let mut v_occupied = BTreeSet::new();
        let mut h_occupied = BTreeSet::new();
        for b in &blocks {
            v_occupied.extend(occupied_cells(b.y0 / h, b.y1 / h, bands));
            h_occupied.extend(occupied_cells(b.x0 / w, b.x1 / w, columns));
        }

        let top = blocks.iter().map(|b| b.y0).fold(f32::INFINITY, f32::min);
        let bottom = blocks.iter().map(|b| b.y1).fold(f32::NEG_INFINITY, f32::max);
        let right = blocks.iter().map(|b| b.x1).fold(f32::NEG_INFINITY, f32::max);
        let area: f32 = blocks.iter().map(BBox::area).sum();

        Some(Self {
            block_count: blocks.len(),
            bottom_ratio: bottom / h,
            right_ratio: right / w,
            vertical_bands: v_occupied.len(),
            horizontal_columns: h_occupied.len(),
            density: area / page.area(),
            vertical_spread: (bottom - top) / h,
        })
    }
}

/// Indices of the cells a span `[start, end]` (as fractions) touches when the
/// unit interval is cut into `cells` parts.
fn occupied_cells(start: f32, end: f32, cells: usize) -> std::ops::RangeInclusive<usize> {
    let first = ((start * cells as f32) as i64).max(0) as usize;
    let last = ((end * cells as f32) as i64).max(0) as usize;
    let last = last.min(cells - 1);
    // An empty range when the span starts past the last cell
    first..=last
}

/// Any structural header keyword is present.
pub fn has_keep_header(text: &str, config: &ClassifierConfig) -> bool {
    config.keep_headers.iter().any(|h| text.contains(h.as_str()))
}

/// "danfe" together with "destinatário" or "documento auxiliar".
pub fn has_main_structure(text: &str) -> bool {
    text.contains("danfe") && (text.contains("destinatário") || text.contains("documento auxiliar"))
}

/// Few blocks confined to the top of the page.
pub fn is_small_fragment(metrics: &PageMetrics, config: &ClassifierConfig) -> bool {
    metrics.block_count <= config.small_fragment_max_blocks
        && metrics.bottom_ratio <= config.small_fragment_max_bottom
        && metrics.vertical_bands <= config.small_fragment_max_bands
}

/// The page repeats or extends the previous page.
pub fn is_continuation(text: &str, previous: &str, config: &ClassifierConfig) -> bool {
    is_similar(text, previous, config.similarity_threshold)
}

/// Sparse blocks spread over most of the page height, without invoice structure.
pub fn is_scattered_fragment(text: &str, metrics: &PageMetrics, config: &ClassifierConfig) -> bool {
    if has_main_structure(text) || metrics.block_count < config.scattered_min_blocks {
        return false;
    }
    config
        .scattered_limits
        .iter()
        .any(|&(max_density, min_spread)| {
            metrics.density < max_density && metrics.vertical_spread > min_spread
        })
}

/// Short text carrying product codes but no invoice structure.
pub fn is_product_fragment(text: &str, config: &ClassifierConfig) -> bool {
    PRODUCT_CODE_FRAGMENT.is_match(text)
        && !has_main_structure(text)
        && text.chars().count() < config.product_fragment_max_len
}
