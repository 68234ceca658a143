//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;
use tracing::debug;

use facta_core::models::config::FactaConfig;

use super::default_config_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "extraction.vat_rate")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => print_value(&path, None),
        ConfigCommand::Get { key } => print_value(&path, Some(&key)),
        ConfigCommand::Init(init_args) => init_config(init_args, path),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

/// The stored configuration, or defaults when no file exists yet.
fn load_or_default(path: &Path) -> anyhow::Result<FactaConfig> {
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(FactaConfig::default());
    }
    Ok(FactaConfig::from_file(path)?)
}

fn write_config(path: &Path, config: &FactaConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(config.save(path)?)
}

/// JSON pointer for a dotted key such as `batch.jobs`.
fn key_pointer(key: &str) -> String {
    key.split('.')
        .map(|part| format!("/{}", part.replace('~', "~0").replace('/', "~1")))
        .collect()
}

fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    json.pointer(&key_pointer(key))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
}

fn assign(json: &mut Value, key: &str, value: Value) -> anyhow::Result<()> {
    let slot = json
        .pointer_mut(&key_pointer(key))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    *slot = value;
    Ok(())
}

/// Print the whole configuration, or one key of it.
fn print_value(path: &Path, key: Option<&str>) -> anyhow::Result<()> {
    let json = serde_json::to_value(load_or_default(path)?)?;
    let value = match key {
        Some(key) => lookup(&json, key)?,
        None => &json,
    };
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_config(args: InitArgs, default_path: PathBuf) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or(default_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    write_config(&output_path, &FactaConfig::default())?;
    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );
    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    // Bare words that are not valid JSON are stored as strings
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let mut json = serde_json::to_value(load_or_default(path)?)?;
    assign(&mut json, key, parsed.clone())?;

    // Invalid values fail here and never reach disk
    let config: FactaConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    write_config(path, &config)?;

    println!("{} Set {} = {}", style("✓").green(), key, parsed);
    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    let status = if path.exists() {
        style("exists").green()
    } else {
        style("not created (run 'facta config init')").yellow()
    };
    println!("{} [{}]", path.display(), status);
    Ok(())
}
