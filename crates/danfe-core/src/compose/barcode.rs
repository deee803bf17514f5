//! Code128 rendering of access keys.

use barcoders::sym::code128::Code128;

use super::canvas::{rotated_90, PageCanvas};
use crate::error::ComposeError;

/// Blank modules on each side of the symbol.
pub const QUIET_ZONE_MODULES: usize = 10;

const CHARSET_B: char = 'Ɓ';
const CHARSET_C: char = 'Ć';

/// Build the encoder input for `data`, picking the densest character set.
///
/// Digit strings use set C; an odd trailing digit falls back to set B.
fn code128_payload(data: &str) -> String {
    let all_digits = !data.is_empty() && data.bytes().all(|b| b.is_ascii_digit());
    if !all_digits || data.len() == 1 {
        return format!("{CHARSET_B}{data}");
    }
    if data.len() % 2 == 0 {
        format!("{CHARSET_C}{data}")
    } else {
        let (pairs, last) = data.split_at(data.len() - 1);
        format!("{CHARSET_C}{pairs}{CHARSET_B}{last}")
    }
}

/// An encoded Code128 symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code128Barcode {
    data: String,
    modules: Vec<u8>,
}

impl Code128Barcode {
    pub fn encode(data: &str) -> Result<Self, ComposeError> {
        let symbol = Code128::new(code128_payload(data))
            .map_err(|e| ComposeError::Barcode(e.to_string()))?;
        Ok(Self {
            data: data.to_string(),
            modules: symbol.encode(),
        })
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Symbol modules, 1 for bar and 0 for space, without quiet zones.
    pub fn modules(&self) -> &[u8] {
        &self.modules
    }

    /// Width in modules including both quiet zones.
    pub fn total_modules(&self) -> usize {
        self.modules.len() + 2 * QUIET_ZONE_MODULES
    }

    /// Bars as `(offset, width)` in modules, offsets counted from the start
    /// of the leading quiet zone.
    pub fn bars(&self) -> Vec<(usize, usize)> {
        let mut bars = Vec::new();
        let mut start = None;
        for (i, &m) in self.modules.iter().enumerate() {
            match (m, start) {
                (1, None) => start = Some(i),
                (0, Some(s)) => {
                    bars.push((s + QUIET_ZONE_MODULES, i - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            bars.push((s + QUIET_ZONE_MODULES, self.modules.len() - s));
        }
        bars
    }

    /// Draw the symbol rotated by 90°, reading bottom to top.
    ///
    /// `(x, y)` is the start of the leading quiet zone on the right edge of
    /// the symbol; bars extend `bar_height` to the left of it.
    pub fn draw_vertical(
        &self,
        canvas: &mut PageCanvas,
        x: f32,
        y: f32,
        module_width: f32,
        bar_height: f32,
    ) {
        canvas.save_state();
        canvas.transform(rotated_90(x, y));
        for (offset, width) in self.bars() {
            canvas.fill_rect(
                offset as f32 * module_width,
                0.0,
                width as f32 * module_width,
                bar_height,
            );
        }
        canvas.restore_state();
    }
}
