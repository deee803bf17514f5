//! Two-column item table: wrapped description and centered quantity.

use std::ops::Range;

use super::canvas::{Font, PageCanvas};
use crate::error::ComposeError;
use crate::models::config::LayoutConfig;

/// Sizes of the table, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableStyle {
    pub font_size: f32,
    pub leading: f32,
    pub vertical_padding: f32,
    pub horizontal_padding: f32,
    pub grid_width: f32,
    pub description_width: f32,
    pub quantity_width: f32,
}

impl TableStyle {
    pub fn from_layout(layout: &LayoutConfig) -> Self {
        let width = layout.page_width * layout.table_width_ratio;
        let description_width = width * layout.description_column_ratio;
        Self {
            font_size: layout.font_size,
            leading: layout.leading,
            vertical_padding: layout.vertical_padding,
            horizontal_padding: layout.horizontal_padding,
            grid_width: layout.grid_width,
            description_width,
            quantity_width: width - description_width,
        }
    }

    pub fn width(&self) -> f32 {
        self.description_width + self.quantity_width
    }
}

/// One item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub lines: Vec<String>,
    pub quantity: String,
}

impl TableRow {
    pub fn height(&self, style: &TableStyle) -> f32 {
        self.lines.len().max(1) as f32 * style.leading + 2.0 * style.vertical_padding
    }
}

/// Rows plus their style.
#[derive(Debug, Clone)]
pub struct ItemTable {
    rows: Vec<TableRow>,
    style: TableStyle,
}

impl ItemTable {
    pub fn new(rows: Vec<TableRow>, style: TableStyle) -> Self {
        Self { rows, style }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn style(&self) -> &TableStyle {
        &self.style
    }

    /// Height of the whole table.
    pub fn height(&self) -> f32 {
        self.rows_height(0..self.rows.len())
    }

    fn rows_height(&self, rows: Range<usize>) -> f32 {
        self.rows[rows].iter().map(|r| r.height(&self.style)).sum()
    }

    /// Split rows into page-sized runs.
    ///
    /// The first run gets `first` points of vertical space and every later
    /// run gets `rest`. The first run may be empty when even its first row
    /// does not fit; a row taller than `rest` cannot be placed at all.
    pub fn paginate(&self, first: f32, rest: f32) -> Result<Vec<Range<usize>>, ComposeError> {
        let mut runs = Vec::new();
        let mut start = 0;
        let mut available = first;
        let mut used = 0.0;

        for (i, row) in self.rows.iter().enumerate() {
            let h = row.height(&self.style);
            if h > rest {
                return Err(ComposeError::TableLayout(format!(
                    "row {} is {h:.1}pt tall, a page holds {rest:.1}pt",
                    i + 1
                )));
            }
            if used + h > available {
                runs.push(start..i);
                start = i;
                available = rest;
                used = 0.0;
            }
            used += h;
        }
        runs.push(start..self.rows.len());

        Ok(runs)
    }

    /// Draw `rows` with the table's top-left corner at `(x, top)`.
    /// Returns the height drawn.
    pub fn draw(&self, canvas: &mut PageCanvas, rows: Range<usize>, x: f32, top: f32) -> f32 {
        let s = self.style;
        let font = Font::HelveticaBold;
        let mut row_top = top;

        for row in &self.rows[rows.clone()] {
            let h = row.height(&s);
            let bottom = row_top - h;

            canvas.stroke_rect(x, bottom, s.description_width, h, s.grid_width);
            canvas.stroke_rect(x + s.description_width, bottom, s.quantity_width, h, s.grid_width);

            let mut baseline = row_top - s.vertical_padding - s.font_size;
            for line in &row.lines {
                canvas.text_at(font, s.font_size, x + s.horizontal_padding, baseline, line);
                baseline -= s.leading;
            }

            // The quantity sits on the row's last text line
            let last_baseline = baseline + s.leading;
            let qty_width = font.text_width(&row.quantity, s.font_size);
            let qty_x = x + s.description_width + (s.quantity_width - qty_width) / 2.0;
            canvas.text_at(font, s.font_size, qty_x, last_baseline, &row.quantity);

            row_top = bottom;
        }

        self.rows_height(rows)
    }
}
