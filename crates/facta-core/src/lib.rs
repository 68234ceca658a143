//! Core library for positional invoice field extraction.
//!
//! This crate provides:
//! - A declarative rule interpreter over line-oriented document text
//! - Locale-aware amount normalization and derived base/tax/total
//! - Per-source extractor profiles with named overrides and a generic fallback
//! - Spanish invoice field rules (NIF/CIF/NIE, dates, plates, amounts)

pub mod error;
pub mod invoice;
pub mod models;

pub use error::{ConfigError, ExtractionError, FactaError, Result};
pub use invoice::{
    DocumentExtraction, ExtractionContext, ExtractionPipeline, ExtractionRule, Extractor,
    ExtractorProfile, FieldMapping, GenericExtractor, ProfileRegistry, RuleConfig, Segment,
};
pub use models::config::FactaConfig;
pub use models::document::Document;
pub use models::result::{ExtractionResult, Field, FieldValue};
pub use models::vat::VatRate;
