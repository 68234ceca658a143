//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod rules;

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use facta_core::models::config::FactaConfig;
use facta_core::VatRate;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facta")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FactaConfig> {
    if let Some(path) = config_path {
        debug!("Loading configuration from {}", path);
        return FactaConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading configuration from {}", default_path.display());
        Ok(FactaConfig::from_file(&default_path)?)
    } else {
        Ok(FactaConfig::default())
    }
}

/// Extraction options shared by `process`, `batch` and `rules identify`.
#[derive(Args, Debug, Clone, Default)]
pub struct ExtractionArgs {
    /// Rule configuration file with extractor profiles
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Default VAT rate (0.21, 21% or 21)
    #[arg(long, value_parser = parse_vat_rate)]
    pub vat_rate: Option<VatRate>,

    /// Tax identifier of the receiving party
    #[arg(long)]
    pub receiver: Option<String>,
}

impl ExtractionArgs {
    /// Override configuration values with the ones given on the command line.
    pub fn apply(&self, config: &mut FactaConfig) {
        if let Some(rules) = &self.rules {
            config.extraction.rules_path = Some(rules.clone());
        }
        if let Some(rate) = self.vat_rate {
            config.extraction.vat_rate = rate;
        }
        if let Some(receiver) = &self.receiver {
            config.extraction.receiver_tax_id = Some(receiver.clone());
        }
    }
}

fn parse_vat_rate(s: &str) -> Result<VatRate, String> {
    s.parse::<VatRate>().map_err(|e| e.to_string())
}
