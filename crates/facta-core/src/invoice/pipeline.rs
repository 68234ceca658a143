//! Per-document extraction: identify, resolve, fall back, validate.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, FactaError};
use crate::models::config::ExtractionConfig;
use crate::models::document::Document;
use crate::models::result::{ExtractionResult, Field};
use crate::models::vat::VatRate;

use super::derive::derive_amounts;
use super::generic::GenericExtractor;
use super::registry::ProfileRegistry;
use super::{ExtractionContext, Extractor};

/// Outcome of one successful document extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentExtraction {
    /// Profile that handled the document; `None` for the generic extractor.
    pub profile: Option<String>,
    /// Fields filled by the generic heuristics after the profile ran.
    pub fallback_fields: Vec<Field>,
    pub result: ExtractionResult,
}

/// Shared, read-only extraction pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    registry: ProfileRegistry,
    generic: GenericExtractor,
    default_vat: VatRate,
}

impl ExtractionPipeline {
    pub fn new(registry: ProfileRegistry, context: ExtractionContext, default_vat: VatRate) -> Self {
        Self {
            registry,
            generic: GenericExtractor::new(context),
            default_vat,
        }
    }

    /// Build the pipeline from configuration, loading the rule file if set.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, FactaError> {
        let registry = match &config.rules_path {
            Some(path) => ProfileRegistry::from_file(path)?,
            None => ProfileRegistry::new(),
        };
        Ok(Self::new(registry, ExtractionContext::from(config), config.vat_rate))
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ExtractionContext {
        self.generic.context()
    }

    pub fn default_vat(&self) -> VatRate {
        self.default_vat
    }

    /// Extract one document. `source` is its identifier, usually a file name.
    pub fn run(&self, doc: &Document, source: Option<&str>) -> Result<DocumentExtraction, ExtractionError> {
        if doc.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let label = source.unwrap_or("<input>");
        let ctx = self.context();

        let (profile, fallback_fields, result) = match self.registry.identify(doc, source, ctx) {
            Some(profile) => {
                let vat = profile.vat_rate().unwrap_or(self.default_vat);
                info!("{}: using profile {} (VAT {})", label, profile.name(), vat);

                let mut result = profile.resolve(doc, ctx);
                let filled = fill_from_generic(&mut result, self.generic.scan(doc));
                if !filled.is_empty() {
                    debug!("{}: {} fields from generic heuristics", label, filled.len());
                }
                derive_amounts(&mut result, vat);
                (Some(profile.name().to_string()), filled, result)
            }
            None => {
                debug!("{}: {}", label, ExtractionError::NoProfileMatched);
                info!("{}: using {} extractor", label, self.generic.name());
                (None, Vec::new(), self.generic.extract(doc, self.default_vat))
            }
        };

        if result.is_empty() {
            warn!("{}: no invoice data found", label);
            return Err(ExtractionError::NoData);
        }
        if !result.has_totals() {
            warn!("{}: neither base nor total resolved", label);
            return Err(ExtractionError::TotalExtractionFailure {
                partial: Box::new(result),
            });
        }

        Ok(DocumentExtraction {
            profile,
            fallback_fields,
            result,
        })
    }
}

/// Copy absent fields from the generic result.
///
/// Amounts are only taken as a group: once the profile resolved a base or a
/// total, generic amounts are ignored so derived values stay consistent.
fn fill_from_generic(result: &mut ExtractionResult, mut generic: ExtractionResult) -> Vec<Field> {
    if result.has_totals() {
        for field in [Field::Base, Field::Tax, Field::Total] {
            generic.remove(field);
        }
    }
    result.fill_missing_from(&generic)
}
