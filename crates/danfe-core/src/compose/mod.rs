//! Label sheet composition.
//!
//! Every invoice record becomes one or more output pages: the label artwork
//! on top, the access key as a vertical Code128 symbol on the right edge,
//! and the item table below the artwork. Pages of a record are staged and
//! only committed to the output when the whole record succeeds.

pub mod artwork;
pub mod barcode;
pub mod canvas;
pub mod table;
pub mod text;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ComposeError, PipelineError};
use crate::models::config::{CorrectionTable, LayoutConfig, PipelineConfig};
use crate::models::invoice::{GenerationResult, InvoiceRecord};
use crate::pdf::PageSource;
use artwork::{find_artwork_page, fit_into, prepare_artwork};
use barcode::Code128Barcode;
use canvas::{rotated_90, FinishedPage, Font, OutputDocument, PageCanvas, CM};
use table::{ItemTable, TableRow, TableStyle};
use text::{display_text, wrap_text, DescriptionNormalizer};

/// Left edge of the item table.
const TABLE_X: f32 = 0.1 * CM;
/// Space kept free above a table that starts a page and below every table.
const TABLE_MARGIN: f32 = CM;
/// Width of one barcode module.
const MODULE_WIDTH: f32 = 0.05 * CM;
/// Length of the barcode bars.
const BAR_HEIGHT: f32 = 1.8 * CM;
const KEY_FONT_SIZE: f32 = 12.0;
const COUNTER_FONT_SIZE: f32 = 14.0;

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RecordStatus {
    Generated {
        pages: usize,
        /// Source page (0-based) the artwork came from.
        artwork_page: Option<usize>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Record position (0-based) in extraction order.
    pub record: usize,
    pub key_prefix: String,
    #[serde(flatten)]
    pub status: RecordStatus,
}

/// Output of a composition run.
#[derive(Debug, Clone)]
pub struct Composition {
    pub pdf: Vec<u8>,
    pub result: GenerationResult,
    pub records: Vec<RecordOutcome>,
}

/// Pages of one record, encoded but not yet committed.
struct StagedRecord {
    pages: Vec<FinishedPage>,
    artwork_page: Option<usize>,
}

/// Builds the normalized label sheet from invoice records.
#[derive(Debug, Clone)]
pub struct DocumentComposer {
    layout: LayoutConfig,
    normalizer: DescriptionNormalizer,
}

impl Default for DocumentComposer {
    fn default() -> Self {
        Self::new(LayoutConfig::default(), &CorrectionTable::default())
    }
}

impl DocumentComposer {
    pub fn new(layout: LayoutConfig, corrections: &CorrectionTable) -> Self {
        Self {
            layout,
            normalizer: DescriptionNormalizer::new(corrections),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.layout.clone(), &config.corrections)
    }

    /// Compose the output document.
    ///
    /// `source` is the pruned document the records were extracted from; it
    /// supplies the label artwork. Records that fail are skipped. Fails only
    /// when no record produced output.
    pub fn compose<S: PageSource + ?Sized>(
        &self,
        records: &[InvoiceRecord],
        source: &S,
    ) -> Result<Composition, PipelineError> {
        let started = Instant::now();
        let mut output = OutputDocument::new();
        let mut outcomes = Vec::with_capacity(records.len());
        let mut generated = 0;

        for (index, record) in records.iter().enumerate() {
            let status = match self.compose_record(index, record, source, generated + 1) {
                Ok(staged) => {
                    let pages = staged.pages.len();
                    for page in staged.pages {
                        output.add_page(page);
                    }
                    generated += 1;
                    info!(
                        record = index + 1,
                        key = record.key_prefix(),
                        pages,
                        "Record composed"
                    );
                    RecordStatus::Generated {
                        pages,
                        artwork_page: staged.artwork_page,
                    }
                }
                Err(e) => {
                    warn!(
                        record = index + 1,
                        key = record.key_prefix(),
                        error = %e,
                        "Skipping record"
                    );
                    RecordStatus::Skipped {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(RecordOutcome {
                record: index,
                key_prefix: record.key_prefix().to_string(),
                status,
            });
        }

        if generated == 0 {
            return Err(PipelineError::GenerationFailed {
                attempted: records.len(),
            });
        }

        let pages = output.page_count();
        let pdf = output.finish()?;
        let result = GenerationResult {
            attempted: records.len(),
            generated,
            pages,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            attempted = result.attempted,
            generated = result.generated,
            pages = result.pages,
            elapsed_ms = result.elapsed_ms,
            "Composition finished"
        );

        Ok(Composition {
            pdf,
            result,
            records: outcomes,
        })
    }

    fn compose_record<S: PageSource + ?Sized>(
        &self,
        index: usize,
        record: &InvoiceRecord,
        source: &S,
        counter: usize,
    ) -> Result<StagedRecord, ComposeError> {
        let issues = record.validate();
        if !issues.is_empty() {
            return Err(ComposeError::InvalidRecord(issues.join("; ")));
        }

        let barcode = Code128Barcode::encode(&record.access_key)?;
        let table = self.item_table(record)?;

        let artwork_page = find_artwork_page(source, index);
        let artwork = match artwork_page {
            Some(page) => {
                debug!(record = index + 1, page = page + 1, "Artwork page selected");
                Some(prepare_artwork(
                    source,
                    page,
                    self.layout.artwork_dpi,
                    self.layout.jpeg_quality,
                )?)
            }
            None => {
                debug!(record = index + 1, "No artwork page in window");
                None
            }
        };

        let (w, h) = (self.layout.page_width, self.layout.page_height);
        let own_page = table.row_count() > self.layout.row_threshold;
        let mut canvas = PageCanvas::new(w, h);
        let mut pages = Vec::new();

        let mut image_height = 0.0;
        if let Some(image) = artwork {
            match self.artwork_box(table.height()) {
                Some((box_w, box_h)) => {
                    let (draw_w, draw_h) =
                        fit_into(image.width as f32, image.height as f32, box_w, box_h);
                    canvas.image(image, 0.0, h - draw_h, draw_w, draw_h);
                    image_height = box_h;
                }
                None => warn!(
                    record = index + 1,
                    table_height = table.height(),
                    "Item table leaves no room for artwork"
                ),
            }
        }

        draw_access_key(&mut canvas, &barcode);

        let mut top = if own_page {
            pages.push(std::mem::replace(&mut canvas, PageCanvas::new(w, h)));
            h - TABLE_MARGIN
        } else {
            h - image_height - TABLE_MARGIN
        };

        let runs = table.paginate(top - TABLE_MARGIN, h - 2.0 * TABLE_MARGIN)?;
        for (i, rows) in runs.into_iter().enumerate() {
            if i > 0 {
                pages.push(std::mem::replace(&mut canvas, PageCanvas::new(w, h)));
                top = h - TABLE_MARGIN;
            }
            table.draw(&mut canvas, rows, TABLE_X, top);
        }

        canvas.text_at(
            Font::HelveticaBold,
            COUNTER_FONT_SIZE,
            w - 2.0 * CM,
            0.3 * CM,
            &format!("P{counter}"),
        );
        pages.push(canvas);

        Ok(StagedRecord {
            pages: pages
                .into_iter()
                .map(PageCanvas::finish)
                .collect::<Result<_, _>>()?,
            artwork_page,
        })
    }

    /// Box available to the artwork: the page width minus the barcode strip,
    /// and the height left once the table and margins are taken out.
    fn artwork_box(&self, table_height: f32) -> Option<(f32, f32)> {
        let box_w = self.layout.page_width - 1.5 * CM;
        let box_h = self.layout.page_height - 0.1 * CM - table_height - 2.0 * CM;
        (box_h > 0.0).then_some((box_w, box_h))
    }

    fn item_table(&self, record: &InvoiceRecord) -> Result<ItemTable, ComposeError> {
        let rows: Vec<TableRow> = record
            .items
            .iter()
            .filter_map(|item| {
                let description = self.normalizer.normalize(&item.description);
                if description.is_empty() {
                    return None;
                }
                Some(TableRow {
                    lines: wrap_text(
                        &display_text(&item.product_code, &description),
                        self.layout.wrap_width,
                    ),
                    quantity: item.quantity.clone(),
                })
            })
            .collect();

        if rows.is_empty() {
            return Err(ComposeError::InvalidRecord(
                "no item has a printable description".to_string(),
            ));
        }
        Ok(ItemTable::new(rows, TableStyle::from_layout(&self.layout)))
    }
}

/// Vertical barcode and human-readable key along the right page edge.
fn draw_access_key(canvas: &mut PageCanvas, barcode: &Code128Barcode) {
    let (w, h) = (canvas.width(), canvas.height());
    barcode.draw_vertical(canvas, w - 0.5 * CM, h - 14.8 * CM, MODULE_WIDTH, BAR_HEIGHT);
    canvas.text(
        Font::Helvetica,
        KEY_FONT_SIZE,
        rotated_90(w - 0.1 * CM, h - 12.0 * CM),
        barcode.data(),
    );
}
