//! Rules command - inspect rule configuration files.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use facta_core::invoice::overrides;
use facta_core::{ExtractionPipeline, ProfileRegistry};

use super::process::{file_name, read_document};
use super::{load_config, ExtractionArgs};

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Load a rule file and list its profiles
    Check {
        /// Rule configuration file
        file: PathBuf,
    },

    /// List the named overrides profiles can refer to
    Overrides,

    /// Show which extractor would handle a document
    Identify {
        /// Input text file
        input: PathBuf,

        /// Source identifier (default: file name)
        #[arg(long)]
        source: Option<String>,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },
}

pub async fn run(args: RulesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        RulesCommand::Check { file } => check_rules(&file),
        RulesCommand::Overrides => list_overrides(),
        RulesCommand::Identify {
            input,
            source,
            extraction,
        } => identify(&input, source, &extraction, config_path),
    }
}

fn check_rules(file: &Path) -> anyhow::Result<()> {
    let registry = ProfileRegistry::from_file(file)
        .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;

    println!(
        "{} {} profiles loaded from {}",
        style("✓").green(),
        registry.len(),
        file.display()
    );

    for profile in registry.profiles() {
        println!();
        println!("{}", style(profile.name()).bold());
        if !profile.keywords().is_empty() {
            println!("  keywords:  {}", profile.keywords().join(", "));
        }
        if !profile.tax_ids().is_empty() {
            println!("  tax ids:   {}", profile.tax_ids().join(", "));
        }
        if let Some(rate) = profile.vat_rate() {
            println!("  VAT rate:  {}", rate);
        }
        let fields: Vec<&str> = profile.mapping().fields().map(|f| f.as_str()).collect();
        if !fields.is_empty() {
            println!("  fields:    {}", fields.join(", "));
        }
        for (field, name) in profile.overrides() {
            println!("  override:  {} -> {}", field, name);
        }
    }

    let shared = registry.shared_keywords();
    if !shared.is_empty() {
        println!();
        println!(
            "{} Keywords used by more than one profile (first registered wins): {}",
            style("⚠").yellow(),
            shared.join(", ")
        );
    }

    Ok(())
}

fn list_overrides() -> anyhow::Result<()> {
    for name in overrides::names() {
        println!("{}", name);
    }
    Ok(())
}

fn identify(
    input: &Path,
    source: Option<String>,
    extraction: &ExtractionArgs,
    config_path: Option<&str>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    extraction.apply(&mut config);

    let pipeline = ExtractionPipeline::from_config(&config.extraction)?;
    let source = source.unwrap_or_else(|| file_name(input));
    let doc = read_document(input)?;

    let registry = pipeline.registry();
    let ctx = pipeline.context();

    if let Some(profile) = registry.by_source(&source) {
        println!("{} (source keyword in {:?})", profile.name(), source);
    } else if let Some(profile) = registry.by_content(&doc, ctx) {
        println!("{} (issuer tax id in content)", profile.name());
    } else {
        println!("generic (no profile matched)");
    }

    Ok(())
}
