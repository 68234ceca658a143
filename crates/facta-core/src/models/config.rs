//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::vat::VatRate;

/// Main configuration for the facta pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactaConfig {
    /// Invoice extraction configuration.
    pub extraction: ExtractionConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// Invoice extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Default VAT rate used to derive missing amounts.
    pub vat_rate: VatRate,

    /// Tax identifier of the receiving party. Never reported as an issuer.
    pub receiver_tax_id: Option<String>,

    /// Number of leading lines scanned for the issuer name.
    pub header_scan_lines: usize,

    /// Only accept tax identifiers whose control character checks out.
    pub validate_tax_ids: bool,

    /// Rule configuration file with extractor profiles.
    pub rules_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            vat_rate: VatRate::default(),
            receiver_tax_id: None,
            header_scan_lines: 10,
            validate_tax_ids: false,
            rules_path: None,
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of documents processed concurrently.
    pub jobs: usize,

    /// File extensions treated as line-oriented documents.
    pub extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            extensions: vec!["txt".to_string()],
        }
    }
}

impl FactaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
