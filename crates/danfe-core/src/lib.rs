//! Core library for normalizing DANFE label sheets.
//!
//! This crate provides:
//! - PDF reading (page text, text blocks and embedded images) on top of lopdf
//! - Page classification that prunes fragment and continuation pages
//! - Access key and line-item extraction from DANFE pages
//! - Generation of the normalized label sheet (artwork, Code128 key, item table)

pub mod classify;
pub mod compose;
pub mod error;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod pipeline;

pub use classify::{ClassificationDecision, PageClassifier, Reason, Verdict};
pub use compose::{Composition, DocumentComposer, RecordOutcome, RecordStatus};
pub use error::{ComposeError, DanfeError, PdfError, PipelineError, Result};
pub use invoice::{DanfeItemExtractor, Extraction, ItemExtractor, PageExtraction, PageOutcome};
pub use models::config::{CorrectionTable, PipelineConfig};
pub use models::invoice::{GenerationResult, InvoiceRecord, LineItem};
pub use models::page::{BBox, Page, TextBlock};
pub use pdf::{PageSource, PdfDocument};
pub use pipeline::{process, Inspection, Pipeline, PipelineOutput, PipelineReport, ProcessOptions};
