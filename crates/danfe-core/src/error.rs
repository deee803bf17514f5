//! Error types for the danfe-core library.

use thiserror::Error;

/// Main error type for the danfe library.
#[derive(Error, Debug)]
pub enum DanfeError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Whole-pipeline failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading and writing PDF documents.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to interpret a page content stream.
    #[error("failed to read content of page {page}: {reason}")]
    Content { page: usize, reason: String },

    /// Failed to extract or decode images from PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page index requested (0-based).
    #[error("invalid page index: {0}")]
    InvalidPage(usize),

    /// The page could not be rendered.
    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    /// No PDF rendering library could be loaded.
    #[error("PDF renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// Failed to serialize a document.
    #[error("failed to write PDF: {0}")]
    Write(String),
}

/// Errors that abandon a single invoice record during composition.
///
/// These never escape the composer; they are logged and the record is skipped.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The record does not satisfy the composition preconditions.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The access key could not be encoded as Code128.
    #[error("barcode encoding failed: {0}")]
    Barcode(String),

    /// The artwork page could not be rasterized.
    #[error("artwork decode failed: {0}")]
    Artwork(#[from] PdfError),

    /// The item table cannot be laid out on the output page.
    #[error("table layout failed: {0}")]
    TableLayout(String),

    /// Failed to encode an output content stream.
    #[error("content encoding failed: {0}")]
    Encoding(String),
}

/// Failures that abort the whole pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The extractor produced zero invoice records.
    #[error(
        "no invoice data extracted: the document does not look like a DANFE label sheet \
         (expected a DANFE page with an access key and an item section)"
    )]
    NoInvoiceData,

    /// The composer generated zero pages although records were extracted.
    #[error("generation failed: none of the {attempted} extracted records produced an output page")]
    GenerationFailed { attempted: usize },

    /// The input could not be opened as a document.
    #[error("unreadable input: {0}")]
    Pdf(#[from] PdfError),
}

impl PipelineError {
    /// Stable identifier of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoInvoiceData => "no-invoice-data-extracted",
            PipelineError::GenerationFailed { .. } => "generation-failed",
            PipelineError::Pdf(_) => "input-failure",
        }
    }
}

/// Result type for the danfe library.
pub type Result<T> = std::result::Result<T, DanfeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_kinds() {
        assert_eq!(PipelineError::NoInvoiceData.kind(), "no-invoice-data-extracted");
        assert_eq!(
            PipelineError::GenerationFailed { attempted: 3 }.kind(),
            "generation-failed"
        );
        assert_eq!(PipelineError::Pdf(PdfError::NoPages).kind(), "input-failure");
    }

    #[test]
    fn test_generation_failed_message_mentions_count() {
        let err = PipelineError::GenerationFailed { attempted: 2 };
        assert!(err.to_string().contains("2 extracted records"));
    }
}
