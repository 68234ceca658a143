//! Line-level field extractors and shared patterns.

pub mod amounts;
pub mod anchor;
pub mod dates;
pub mod party;
pub mod patterns;
pub mod plate;
pub mod tax_id;

pub use amounts::{format_amount, locate_amount, locate_amounts, normalize_amount, AmountExtractor};
pub use anchor::{find_anchor, find_anchor_from};
pub use dates::{find_date, is_date, parse_date, DateExtractor};
pub use party::{has_company_suffix, is_legal_entity_line};
pub use plate::{find_plate, find_plate_in_document, is_plate, normalize_plate};
pub use tax_id::{is_tax_id, normalize_tax_id, same_tax_id, validate_tax_id, TaxIdExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value found in text, with the text it came from.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
