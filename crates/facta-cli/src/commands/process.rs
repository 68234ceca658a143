//! Process command - extract fields from a single document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::{debug, info};

use facta_core::models::document::Document;
use facta_core::invoice::rules::format_amount;
use facta_core::{ExtractionPipeline, ExtractionResult, Field, FieldValue};

use super::{load_config, ExtractionArgs};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input text file, one document line per line
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Source identifier used for profile selection (default: file name)
    #[arg(long)]
    source: Option<String>,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// What gets printed for one document.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub source: &'a str,
    /// Profile name, or `generic`.
    pub extractor: &'a str,
    /// False when the base and total could not be resolved.
    pub complete: bool,
    pub fields: &'a ExtractionResult,
    #[serde(skip_serializing_if = "<[Field]>::is_empty")]
    pub fallback_fields: &'a [Field],
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.extraction.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pipeline = ExtractionPipeline::from_config(&config.extraction)?;
    let source = args.source.clone().unwrap_or_else(|| file_name(&args.input));

    info!("Processing file: {}", args.input.display());
    let doc = read_document(&args.input)?;
    debug!("{} lines read", doc.len());

    let (output, failure) = match pipeline.run(&doc, Some(&source)) {
        Ok(extraction) => {
            let report = Report {
                source: &source,
                extractor: extraction.profile.as_deref().unwrap_or("generic"),
                complete: true,
                fields: &extraction.result,
                fallback_fields: &extraction.fallback_fields,
            };
            (format_report(&report, args.format)?, None)
        }
        Err(e) => match e.partial() {
            Some(partial) => {
                let report = Report {
                    source: &source,
                    extractor: extractor_name(&pipeline, &doc, &source),
                    complete: false,
                    fields: partial,
                    fallback_fields: &[],
                };
                (format_report(&report, args.format)?, Some(e))
            }
            None => anyhow::bail!("{}: {}", source, e),
        },
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if let Some(e) = failure {
        eprintln!("{} {}: {}", style("✗").red(), source, e);
        anyhow::bail!(e);
    }

    Ok(())
}

/// Read a text document, replacing invalid UTF-8 sequences.
pub fn read_document(path: &Path) -> anyhow::Result<Document> {
    let data = fs::read(path)?;
    Ok(Document::from_text(&String::from_utf8_lossy(&data)))
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extractor_name<'a>(pipeline: &'a ExtractionPipeline, doc: &Document, source: &str) -> &'a str {
    pipeline
        .registry()
        .identify(doc, Some(source), pipeline.context())
        .map(|p| p.name())
        .unwrap_or("generic")
}

fn format_report(report: &Report<'_>, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &Report<'_>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(std::iter::once("filename").chain(Field::ALL.iter().map(|f| f.as_str())))?;
    wtr.write_record(std::iter::once(report.source.to_string()).chain(report.fields.to_row()))?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data.trim_end().to_string())
}

fn format_text(report: &Report<'_>) -> String {
    let mut output = String::new();

    output.push_str(&format!("Source:    {}\n", report.source));
    output.push_str(&format!("Extractor: {}\n", report.extractor));
    if !report.complete {
        output.push_str("Status:    incomplete (no base or total)\n");
    }
    output.push('\n');

    for (field, value) in report.fields.iter() {
        let marker = if report.fallback_fields.contains(&field) { " *" } else { "" };
        let shown = match value {
            FieldValue::Amount(amount) => format_amount(*amount),
            FieldValue::Text(text) => text.clone(),
        };
        output.push_str(&format!("  {:<15} {}{}\n", field.as_str(), shown, marker));
    }

    if !report.fallback_fields.is_empty() {
        output.push_str("\n  * from generic heuristics\n");
    }

    output.trim_end().to_string()
}
