//! Invoice field extraction module.

pub mod derive;
pub mod generic;
pub mod mapping;
pub mod overrides;
pub mod pipeline;
pub mod registry;
pub mod rule;
pub mod rules;

pub use generic::GenericExtractor;
pub use mapping::{FieldAttempt, FieldMapping, Validator};
pub use pipeline::{DocumentExtraction, ExtractionPipeline};
pub use registry::{ExtractorProfile, ProfileConfig, ProfileExtractor, ProfileRegistry, RuleConfig};
pub use rule::{ExtractionRule, Segment};

use crate::models::config::ExtractionConfig;
use crate::models::document::Document;
use crate::models::result::ExtractionResult;
use crate::models::vat::VatRate;

use rules::tax_id::{same_tax_id, TaxIdExtractor};

/// Trait for invoice field extractors.
///
/// Implemented by source-specific profiles and by the generic fallback.
pub trait Extractor {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Extract every field this extractor knows about.
    fn extract(&self, doc: &Document, vat_rate: VatRate) -> ExtractionResult;
}

/// Settings shared by every extractor for one run.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// Tax identifier of the receiving party, never reported as issuer.
    pub receiver_tax_id: Option<String>,
    /// Leading lines scanned for the issuer name.
    pub header_scan_lines: usize,
    /// Check control characters of tax identifiers.
    pub validate_tax_ids: bool,
}

impl ExtractionContext {
    pub fn new() -> Self {
        Self {
            receiver_tax_id: None,
            header_scan_lines: 10,
            validate_tax_ids: false,
        }
    }

    pub fn with_receiver(mut self, tax_id: impl Into<String>) -> Self {
        self.receiver_tax_id = Some(tax_id.into());
        self
    }

    pub fn with_header_scan_lines(mut self, lines: usize) -> Self {
        self.header_scan_lines = lines;
        self
    }

    pub fn with_tax_id_validation(mut self, validate: bool) -> Self {
        self.validate_tax_ids = validate;
        self
    }

    /// Whether the value is the receiver's own identifier.
    pub fn is_receiver(&self, tax_id: &str) -> bool {
        self.receiver_tax_id
            .as_deref()
            .is_some_and(|receiver| same_tax_id(receiver, tax_id))
    }

    /// Tax identifier extractor that skips the receiver.
    pub fn tax_ids(&self) -> TaxIdExtractor {
        TaxIdExtractor::new()
            .with_validation(self.validate_tax_ids)
            .excluding(self.receiver_tax_id.as_deref())
    }
}

impl Default for ExtractionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&ExtractionConfig> for ExtractionContext {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            receiver_tax_id: config.receiver_tax_id.clone().filter(|id| !id.trim().is_empty()),
            header_scan_lines: config.header_scan_lines,
            validate_tax_ids: config.validate_tax_ids,
        }
    }
}
