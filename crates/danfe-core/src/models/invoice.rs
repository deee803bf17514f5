//! Invoice record data model.
//!
//! Records are produced by the item extractor and consumed read-only by the
//! composer.

use serde::{Deserialize, Serialize};

/// Default quantity when no `QUANT.` marker is found for an item.
pub const DEFAULT_QUANTITY: &str = "1";

/// Minimum number of digits for an accepted access key.
pub const MIN_ACCESS_KEY_DIGITS: usize = 40;

/// Number of digits of a well-formed access key.
pub const ACCESS_KEY_DIGITS: usize = 44;

/// One product entry of a DANFE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product code (more than 3 characters).
    pub product_code: String,

    /// Product description (non-empty).
    pub description: String,

    /// Quantity as printed, digits only.
    #[serde(default = "default_quantity")]
    pub quantity: String,
}

fn default_quantity() -> String {
    DEFAULT_QUANTITY.to_string()
}

impl LineItem {
    /// Build a line item, returning `None` when it violates the item invariants.
    pub fn new(
        product_code: impl Into<String>,
        description: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Option<Self> {
        let item = Self {
            product_code: product_code.into().trim().to_string(),
            description: description.into().trim().to_string(),
            quantity: quantity.into(),
        };
        item.is_valid().then_some(item)
    }

    /// Check the code and description invariants.
    pub fn is_valid(&self) -> bool {
        self.product_code.chars().count() > 3 && !self.description.is_empty()
    }
}

/// Access key plus the line items of one DANFE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Access key digits.
    pub access_key: String,

    /// Items in document order.
    pub items: Vec<LineItem>,
}

impl InvoiceRecord {
    pub fn new(access_key: impl Into<String>, items: Vec<LineItem>) -> Self {
        Self {
            access_key: access_key.into(),
            items,
        }
    }

    /// Check the record invariants required before composition.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.access_key.len() < MIN_ACCESS_KEY_DIGITS {
            issues.push(format!(
                "access key has {} digits, expected at least {}",
                self.access_key.len(),
                MIN_ACCESS_KEY_DIGITS
            ));
        }

        if !self.access_key.chars().all(|c| c.is_ascii_digit()) {
            issues.push("access key contains non-digit characters".to_string());
        }

        if self.items.is_empty() {
            issues.push("No line items".to_string());
        }

        issues
    }

    /// Prefix of the access key that is safe to log.
    pub fn key_prefix(&self) -> &str {
        key_prefix(&self.access_key)
    }
}

/// First ten characters of an access key.
pub fn key_prefix(key: &str) -> &str {
    match key.char_indices().nth(10) {
        Some((end, _)) => &key[..end],
        None => key,
    }
}

/// Outcome counters of a composition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Records handed to the composer.
    pub attempted: usize,

    /// Records that produced committed output.
    pub generated: usize,

    /// Physical pages in the output document.
    pub pages: usize,

    /// Wall time of the composition in milliseconds.
    pub elapsed_ms: u64,
}

impl GenerationResult {
    /// At least one record produced output.
    pub fn is_success(&self) -> bool {
        self.generated >= 1
    }
}
