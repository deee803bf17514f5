//! Rule-based field extractors for DANFE pages.

pub mod access_key;
pub mod patterns;

pub use access_key::{validate_access_key, AccessKeyExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;
}

/// An extracted value together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Anchor that led to the value.
    pub anchor: String,
    /// Byte offset of the anchor in the source text.
    pub position: usize,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, anchor: impl Into<String>, position: usize) -> Self {
        Self {
            value,
            anchor: anchor.into(),
            position,
        }
    }
}
