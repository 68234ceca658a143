//! Error types for the facta-core library.

use thiserror::Error;

use crate::models::result::ExtractionResult;

/// Main error type for the facta library.
#[derive(Error, Debug)]
pub enum FactaError {
    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Rule or pipeline configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to invoice field extraction.
///
/// Rule-level variants (`AnchorNotFound`, `IndexOutOfRange`, `NotNumeric`)
/// are recovered inside the interpreter by moving on to the next attempt.
/// Only the document-level variants reach callers of the pipeline.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A monetary value could not be parsed.
    #[error("not a numeric value: {0:?}")]
    NotNumeric(String),

    /// The reference text of a VARIABLE rule is absent from the document.
    #[error("anchor not found: {0}")]
    AnchorNotFound(String),

    /// A resolved line or token index falls outside the document.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// A rule record that can never match (unknown type, malformed segment).
    #[error("unsupported rule: {0}")]
    UnsupportedRule(String),

    /// No profile matched the document; the generic extractor applies.
    #[error("no extractor profile matched")]
    NoProfileMatched,

    /// Neither base nor total could be resolved.
    #[error("no base or total amount could be resolved")]
    TotalExtractionFailure {
        /// Whatever fields were resolved before giving up.
        partial: Box<ExtractionResult>,
    },

    /// The document has no lines.
    #[error("document is empty")]
    EmptyDocument,

    /// No invoice data could be extracted.
    #[error("no invoice data found")]
    NoData,
}

impl ExtractionError {
    /// Partial result carried by a document-level failure, if any.
    pub fn partial(&self) -> Option<&ExtractionResult> {
        match self {
            ExtractionError::TotalExtractionFailure { partial } => Some(partial),
            _ => None,
        }
    }
}

/// Errors raised while loading rule configuration.
///
/// These fail fast, before any document is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field key is not one of the known result fields.
    #[error("unknown field key: {0}")]
    UnknownField(String),

    /// An override name is not registered.
    #[error("profile {profile}: unknown override {name:?} for field {field}")]
    UnknownOverride {
        profile: String,
        field: String,
        name: String,
    },

    /// VAT rate must be strictly positive.
    #[error("invalid VAT rate: {0}")]
    InvalidVatRate(String),

    /// A profile can never be selected.
    #[error("profile {0} has neither keywords nor tax ids")]
    UnreachableProfile(String),

    /// Two profiles share a name.
    #[error("duplicate profile name: {0}")]
    DuplicateProfile(String),

    /// The rule file could not be parsed.
    #[error("failed to parse rule configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The rule file could not be read.
    #[error("failed to read rule configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the facta library.
pub type Result<T> = std::result::Result<T, FactaError>;
