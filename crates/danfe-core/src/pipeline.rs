//! End-to-end processing: prune, extract, compose.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{ClassificationDecision, PageClassifier};
use crate::compose::{DocumentComposer, RecordOutcome};
use crate::error::PipelineError;
use crate::invoice::{DanfeItemExtractor, Extraction, ItemExtractor, PageExtraction};
use crate::models::config::PipelineConfig;
use crate::models::invoice::GenerationResult;
use crate::pdf::{PageSource, PdfDocument};

/// Options of a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Also serialize the pruned intermediate document.
    pub keep_precleaned: bool,
}

/// Diagnostic events of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub source_pages: usize,
    pub kept_pages: usize,
    pub decisions: Vec<ClassificationDecision>,
    pub extraction: Vec<PageExtraction>,
    pub records: Vec<RecordOutcome>,
    pub result: GenerationResult,
}

/// Successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub pdf: Vec<u8>,
    /// The pruned document, when requested.
    pub precleaned: Option<Vec<u8>>,
    pub report: PipelineReport,
}

/// Classification and extraction without composition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub source_pages: usize,
    pub kept_pages: usize,
    pub decisions: Vec<ClassificationDecision>,
    pub extraction: Extraction,
}

/// The three stages wired together.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    classifier: PageClassifier,
    extractor: DanfeItemExtractor,
    composer: DocumentComposer,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            classifier: PageClassifier::new(config.classifier.clone()),
            extractor: DanfeItemExtractor::new(&config.extraction),
            composer: DocumentComposer::from_config(config),
        }
    }

    /// Classify and extract, reporting what a full run would work with.
    pub fn inspect(&self, input: &[u8]) -> Result<Inspection, PipelineError> {
        let doc = PdfDocument::load(input)?;
        let pruned = self.classifier.prune(&doc)?;

        let (kept_pages, extraction) = match &pruned.document {
            Some(kept) => (kept.page_count(), self.extractor.extract(kept.pages())),
            None => (0, Extraction::default()),
        };

        Ok(Inspection {
            source_pages: doc.page_count(),
            kept_pages,
            decisions: pruned.decisions,
            extraction,
        })
    }

    pub fn process(&self, input: &[u8]) -> Result<PipelineOutput, PipelineError> {
        self.process_with(input, ProcessOptions::default())
    }

    pub fn process_with(
        &self,
        input: &[u8],
        options: ProcessOptions,
    ) -> Result<PipelineOutput, PipelineError> {
        let doc = PdfDocument::load(input)?;
        info!(pages = doc.page_count(), bytes = input.len(), "Document loaded");

        let started = Instant::now();
        let pruned = self.classifier.prune(&doc)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            dropped = pruned.dropped().len(),
            "Classification finished"
        );

        let Some(kept) = pruned.document else {
            warn!("No page survived classification");
            return Err(PipelineError::NoInvoiceData);
        };

        let started = Instant::now();
        let extraction = self.extractor.extract(kept.pages());
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            records = extraction.records.len(),
            "Extraction finished"
        );
        if extraction.records.is_empty() {
            return Err(PipelineError::NoInvoiceData);
        }

        let precleaned = if options.keep_precleaned {
            Some(kept.to_bytes()?)
        } else {
            None
        };

        let composition = self.composer.compose(&extraction.records, &*kept)?;

        Ok(PipelineOutput {
            pdf: composition.pdf,
            precleaned,
            report: PipelineReport {
                source_pages: doc.page_count(),
                kept_pages: kept.page_count(),
                decisions: pruned.decisions,
                extraction: extraction.pages,
                records: composition.records,
                result: composition.result,
            },
        })
    }
}

/// Run the whole pipeline with the given configuration.
pub fn process(input: &[u8], config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    Pipeline::new(config).process(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{build_pdf, FixturePage};
    use pretty_assertions::assert_eq;

    fn danfe_page(key: &str) -> FixturePage {
        FixturePage::new()
            .line(40.0, 800.0, "DANFE")
            .line(40.0, 780.0, "DOCUMENTO AUXILIAR DA NOTA FISCAL")
            .line(40.0, 760.0, "CHAVE DE ACESSO")
            .line(40.0, 745.0, key)
            .line(40.0, 700.0, "ITEM")
            .line(40.0, 685.0, "01")
            .line(40.0, 670.0, "ABC12345 Blue Shoe Size 42")
            .line(40.0, 655.0, "QUANT.")
            .line(40.0, 640.0, "3")
    }

    #[test]
    fn test_process_reports_every_stage() {
        let bytes = build_pdf(&[
            danfe_page("35240612345678000190550010000123451234567891"),
            FixturePage::new().image(20, 20),
        ]);
        let output = Pipeline::default()
            .process_with(&bytes, ProcessOptions { keep_precleaned: true })
            .unwrap();

        let report = &output.report;
        assert_eq!(report.source_pages, 2);
        assert_eq!(report.kept_pages, 2);
        assert_eq!(report.result.generated, 1);
        assert_eq!(report.records.len(), 1);
        assert!(output.precleaned.is_some());
        assert!(PdfDocument::load(&output.pdf).is_ok());
    }

    #[test]
    fn test_inspect_does_not_fail_without_records() {
        let bytes = build_pdf(&[FixturePage::new().line(40.0, 800.0, "pedido criado em 01/02")]);
        let inspection = Pipeline::default().inspect(&bytes).unwrap();
        assert_eq!(inspection.source_pages, 1);
        assert!(inspection.extraction.records.is_empty());
    }

    #[test]
    fn test_unreadable_input_is_an_input_failure() {
        let err = process(b"not a pdf", &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "input-failure");
    }
}
