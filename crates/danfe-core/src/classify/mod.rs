//! Page classification and pruning.
//!
//! Each source page is kept or dropped by a set of independent heuristics.
//! Pages carrying a structural header keyword are always kept; the others are
//! dropped when any of the drop rules in [`predicates`] fires.

pub mod predicates;
pub mod similarity;

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PdfError;
use crate::models::config::ClassifierConfig;
use crate::models::page::Page;
use crate::pdf::PdfDocument;
use predicates::{
    has_keep_header, is_continuation, is_product_fragment, is_scattered_fragment,
    is_small_fragment, PageMetrics,
};
use similarity::normalize_text;

/// Why a page was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Kept: a structural header keyword is present.
    StructuralHeader,
    /// Kept: no text block is large enough to judge the page.
    NoQualifyingBlocks,
    /// Dropped: few blocks confined to the top of the page.
    SmallFragment,
    /// Dropped: repeats or extends the previous page.
    Continuation,
    /// Dropped: sparse blocks spread over the page.
    ScatteredFragment,
    /// Dropped: short text with product codes only.
    ProductFragment,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::StructuralHeader => "structural-header",
            Reason::NoQualifyingBlocks => "no-qualifying-blocks",
            Reason::SmallFragment => "small-fragment",
            Reason::Continuation => "continuation",
            Reason::ScatteredFragment => "scattered-fragment",
            Reason::ProductFragment => "product-fragment",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep or drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Keep,
    Drop,
}

/// Classification outcome of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDecision {
    /// Page index (0-based) in the source document.
    pub page: usize,
    pub verdict: Verdict,
    /// Triggered reasons, for diagnostics only.
    pub reasons: Vec<Reason>,
    /// Geometric signals, when the page had qualifying blocks.
    pub metrics: Option<PageMetrics>,
}

impl ClassificationDecision {
    fn keep(page: usize, reasons: Vec<Reason>, metrics: Option<PageMetrics>) -> Self {
        Self {
            page,
            verdict: Verdict::Keep,
            reasons,
            metrics,
        }
    }

    pub fn is_drop(&self) -> bool {
        self.verdict == Verdict::Drop
    }

    /// Reason tags joined with commas.
    pub fn reason_tags(&self) -> String {
        self.reasons
            .iter()
            .map(Reason::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Result of pruning a document.
#[derive(Debug)]
pub struct Pruned<'d> {
    /// One decision per source page, in order.
    pub decisions: Vec<ClassificationDecision>,
    /// The retained pages, or `None` when every page was dropped.
    ///
    /// Borrowed when nothing was dropped.
    pub document: Option<Cow<'d, PdfDocument>>,
}

impl Pruned<'_> {
    /// Indices of the dropped source pages.
    pub fn dropped(&self) -> BTreeSet<usize> {
        dropped_indices(&self.decisions)
    }
}

fn dropped_indices(decisions: &[ClassificationDecision]) -> BTreeSet<usize> {
    decisions
        .iter()
        .filter(|d| d.is_drop())
        .map(|d| d.page)
        .collect()
}

/// Scores pages and decides which ones to drop.
#[derive(Debug, Clone, Default)]
pub struct PageClassifier {
    config: ClassifierConfig,
}

impl PageClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify every page, in order.
    pub fn classify(&self, pages: &[Page]) -> Vec<ClassificationDecision> {
        let mut previous = String::new();
        let mut decisions = Vec::with_capacity(pages.len());

        for page in pages {
            let text = normalize_text(&page.text);
            let decision = self.classify_page(page, &text, &previous);

            if decision.is_drop() {
                info!(
                    page = page.index + 1,
                    reasons = %decision.reason_tags(),
                    "Page marked for removal"
                );
                if let (true, Some(m)) = (
                    decision.reasons.contains(&Reason::ScatteredFragment),
                    &decision.metrics,
                ) {
                    info!(
                        page = page.index + 1,
                        density = format_args!("{:.3}", m.density),
                        vertical_spread = format_args!("{:.3}", m.vertical_spread),
                        "Scattered fragment"
                    );
                }
            } else {
                debug!(page = page.index + 1, reasons = %decision.reason_tags(), "Page kept");
            }

            decisions.push(decision);
            previous = text;
        }

        decisions
    }

    fn classify_page(&self, page: &Page, text: &str, previous: &str) -> ClassificationDecision {
        let config = &self.config;

        if has_keep_header(text, config) {
            return ClassificationDecision::keep(page.index, vec![Reason::StructuralHeader], None);
        }

        let Some(metrics) = PageMetrics::measure(page, config) else {
            return ClassificationDecision::keep(page.index, vec![Reason::NoQualifyingBlocks], None);
        };

        let rules = [
            (Reason::SmallFragment, is_small_fragment(&metrics, config)),
            (Reason::Continuation, is_continuation(text, previous, config)),
            (
                Reason::ScatteredFragment,
                is_scattered_fragment(text, &metrics, config),
            ),
            (Reason::ProductFragment, is_product_fragment(text, config)),
        ];
        let reasons: Vec<Reason> = rules
            .iter()
            .filter(|(_, fired)| *fired)
            .map(|(reason, _)| *reason)
            .collect();

        if reasons.is_empty() {
            ClassificationDecision::keep(page.index, reasons, Some(metrics))
        } else {
            ClassificationDecision {
                page: page.index,
                verdict: Verdict::Drop,
                reasons,
                metrics: Some(metrics),
            }
        }
    }

    /// Classify a document and build the document of retained pages.
    pub fn prune<'d>(&self, doc: &'d PdfDocument) -> Result<Pruned<'d>, PdfError> {
        let decisions = self.classify(doc.pages());
        let dropped = dropped_indices(&decisions);

        let document = if dropped.is_empty() {
            Some(Cow::Borrowed(doc))
        } else if dropped.len() == decisions.len() {
            info!("Every page was marked for removal");
            None
        } else {
            info!(
                dropped = dropped.len(),
                kept = decisions.len() - dropped.len(),
                "Pruned document"
            );
            Some(Cow::Owned(doc.without_pages(&dropped)?))
        };

        Ok(Pruned {
            decisions,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::page::BBox;
    use crate::pdf::fixtures::{build_pdf, FixturePage};
    use crate::pdf::PageSource;
    use pretty_assertions::assert_eq;

    const W: f32 = 595.0;
    const H: f32 = 842.0;

    fn label_page(index: usize, text: &str) -> Page {
        Page::new(index, W, H)
            .with_text(text)
            .with_block(BBox::new(40.0, 60.0, 560.0, 700.0), text)
    }

    #[test]
    fn test_structural_header_keeps_page_regardless_of_geometry() {
        let page = Page::new(0, W, H)
            .with_text("DANFE")
            .with_block(BBox::new(10.0, 10.0, 60.0, 30.0), "DANFE");
        let decisions = PageClassifier::default().classify(&[page]);
        assert_eq!(decisions[0].verdict, Verdict::Keep);
        assert_eq!(decisions[0].reasons, vec![Reason::StructuralHeader]);
    }

    #[test]
    fn test_page_without_qualifying_blocks_is_kept() {
        let page = Page::new(0, W, H)
            .with_text(".")
            .with_block(BBox::new(10.0, 10.0, 12.0, 12.0), ".");
        let decisions = PageClassifier::default().classify(&[page]);
        assert_eq!(decisions[0].verdict, Verdict::Keep);
        assert_eq!(decisions[0].reasons, vec![Reason::NoQualifyingBlocks]);
    }

    #[test]
    fn test_small_fragment_at_top_is_dropped() {
        let page = Page::new(0, W, H)
            .with_text("Rua das Flores 10\nSao Paulo")
            .with_block(BBox::new(40.0, 40.0, 300.0, 80.0), "Rua das Flores 10")
            .with_block(BBox::new(40.0, 150.0, 300.0, 190.0), "Sao Paulo");
        let decisions = PageClassifier::default().classify(&[page]);
        assert!(decisions[0].is_drop());
        assert_eq!(decisions[0].reasons, vec![Reason::SmallFragment]);
    }

    #[test]
    fn test_continuation_of_previous_page_is_dropped() {
        let base = "envio expresso lote 77 transportadora azul volume unico fragil manter seco";
        let pages = vec![
            label_page(0, base),
            label_page(1, &format!("{base} conferido")),
        ];
        let decisions = PageClassifier::default().classify(&pages);
        assert_eq!(decisions[0].verdict, Verdict::Keep);
        assert!(decisions[1].is_drop());
        assert!(decisions[1].reasons.contains(&Reason::Continuation));
    }

    #[test]
    fn test_previous_text_tracks_dropped_pages_too() {
        let pages = vec![
            label_page(0, "alpha beta gamma delta"),
            label_page(1, "alpha beta gamma delta"),
            label_page(2, "alpha beta gamma delta"),
        ];
        let decisions = PageClassifier::default().classify(&pages);
        let verdicts: Vec<Verdict> = decisions.iter().map(|d| d.verdict).collect();
        assert_eq!(verdicts, vec![Verdict::Keep, Verdict::Drop, Verdict::Drop]);
    }

    #[test]
    fn test_unrelated_full_page_is_kept() {
        let pages = vec![
            label_page(0, "envio expresso lote 77"),
            label_page(1, "nota de agradecimento obrigado pela compra"),
        ];
        let decisions = PageClassifier::default().classify(&pages);
        assert!(decisions.iter().all(|d| d.verdict == Verdict::Keep));
        assert!(decisions[1].reasons.is_empty());
    }

    #[test]
    fn test_prune_without_drops_borrows_input() {
        let bytes = build_pdf(&[FixturePage::new().line(50.0, 800.0, "DANFE")]);
        let doc = PdfDocument::load(&bytes).unwrap();
        let pruned = PageClassifier::default().prune(&doc).unwrap();
        assert!(matches!(pruned.document, Some(Cow::Borrowed(_))));
        assert!(pruned.dropped().is_empty());
    }

    #[test]
    fn test_prune_removes_dropped_pages() {
        let bytes = build_pdf(&[
            FixturePage::new().line(50.0, 800.0, "DANFE"),
            FixturePage::new().line(50.0, 800.0, "Rua das Flores 10"),
            FixturePage::new().image(4, 4),
        ]);
        let doc = PdfDocument::load(&bytes).unwrap();
        let pruned = PageClassifier::default().prune(&doc).unwrap();

        assert_eq!(pruned.dropped(), BTreeSet::from([1]));
        let kept = pruned.document.unwrap();
        assert_eq!(kept.page_count(), 2);
        assert!(kept.pages()[1].has_images());
    }

    #[test]
    fn test_prune_everything_yields_no_document() {
        let bytes = build_pdf(&[FixturePage::new().line(50.0, 800.0, "Rua das Flores 10")]);
        let doc = PdfDocument::load(&bytes).unwrap();
        let pruned = PageClassifier::default().prune(&doc).unwrap();
        assert!(pruned.document.is_none());
    }
}
