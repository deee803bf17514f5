//! Page snapshot types shared by the classifier, extractor and composer.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page space.
///
/// The origin is the top-left corner of the page and `y` grows downwards,
/// so `y1` is the bottom edge of the box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Create a box from two corners, normalizing their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Check whether the horizontal extents of two boxes overlap.
    pub fn overlaps_horizontally(&self, other: &BBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }
}

/// A block of text lines with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub bbox: BBox,
    /// Block text, one line per `\n`.
    pub text: String,
}

impl TextBlock {
    pub fn new(bbox: BBox, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

/// Snapshot of a single source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page index (0-based) within its document.
    pub index: usize,
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// Rendered page text in content order, lines separated by `\n`.
    pub text: String,
    /// Text blocks found on the page.
    pub blocks: Vec<TextBlock>,
    /// Number of image XObjects referenced by the page.
    pub image_count: usize,
}

impl Page {
    /// Create an empty page of the given size.
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            text: String::new(),
            blocks: Vec::new(),
            image_count: 0,
        }
    }

    /// Set the page text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Append a text block.
    pub fn with_block(mut self, bbox: BBox, text: impl Into<String>) -> Self {
        self.blocks.push(TextBlock::new(bbox, text));
        self
    }

    /// Set the number of embedded images.
    pub fn with_images(mut self, count: usize) -> Self {
        self.image_count = count;
        self
    }

    pub fn has_images(&self) -> bool {
        self.image_count > 0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Whether the page text carries the DANFE marker (case-insensitive).
    pub fn looks_like_danfe(&self) -> bool {
        self.text.starts_with("DANFE") || self.text.to_uppercase().contains("DANFE")
    }
}
