//! Batch command - extract many documents into one CSV table.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::{stream, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use facta_core::{ExtractionPipeline, ExtractionResult, Field};

use super::process::{file_name, read_document};
use super::{load_config, ExtractionArgs};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input directory or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output CSV file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write failed documents and their errors to this CSV file
    #[arg(long)]
    failures: Option<PathBuf>,

    /// Number of documents processed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    profile: Option<String>,
    /// Complete result, or the partial one of a failed document.
    fields: Option<ExtractionResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

impl ProcessResult {
    /// A document that produced no fields at all.
    fn failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            profile: None,
            fields: None,
            error: Some(error),
            processing_time_ms: 0,
        }
    }

    fn filename(&self) -> String {
        file_name(&self.path)
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.extraction.apply(&mut config);

    let files = collect_files(&args.input, &config.batch.extensions)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pipeline = Arc::new(ExtractionPipeline::from_config(&config.extraction)?);
    let jobs = args.jobs.unwrap_or(config.batch.jobs).max(1);
    debug!("Processing with {} concurrent jobs", jobs);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    // buffered keeps input order while running up to `jobs` documents at once
    let mut outcomes = stream::iter(files)
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            run_worker(path, move |path| process_single_file(path, &pipeline))
        })
        .buffered(jobs);

    let mut results = Vec::new();
    while let Some(result) = outcomes.next().await {
        if let Some(error) = &result.error {
            warn!("Failed to process {}: {}", result.path.display(), error);
        }
        pb.inc(1);
        results.push(result);
    }
    pb.finish_and_clear();

    match &args.output {
        Some(path) => {
            write_table(csv::Writer::from_path(path)?, &results)?;
            eprintln!("{} Table written to {}", style("✓").green(), path.display());
        }
        None => write_table(csv::Writer::from_writer(io::stdout()), &results)?,
    }

    let failed: Vec<&ProcessResult> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(path) = &args.failures {
        write_failures(path, &failed)?;
        eprintln!("{} Failures written to {}", style("✓").green(), path.display());
    }

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for result in &failed {
            eprintln!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Expand a directory or glob into document paths, sorted by path.
fn collect_files(input: &str, extensions: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let has_extension = |p: &Path| {
        let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
        extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    };

    let dir = Path::new(input);
    let mut files: Vec<PathBuf> = if dir.is_dir() {
        fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_extension(p.as_path()))
            .collect()
    } else {
        glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file() && has_extension(p.as_path()))
            .collect()
    };

    files.sort();
    Ok(files)
}

/// Run one document on the blocking pool. A worker that dies becomes a failed row.
async fn run_worker<F>(path: PathBuf, work: F) -> ProcessResult
where
    F: FnOnce(PathBuf) -> ProcessResult + Send + 'static,
{
    let worker_path = path.clone();
    match tokio::task::spawn_blocking(move || work(worker_path)).await {
        Ok(result) => result,
        Err(e) => ProcessResult::failed(path, e.to_string()),
    }
}

fn process_single_file(path: PathBuf, pipeline: &ExtractionPipeline) -> ProcessResult {
    let file_start = Instant::now();
    let source = file_name(&path);

    let (profile, fields, error) = match read_document(&path) {
        Ok(doc) => match pipeline.run(&doc, Some(&source)) {
            Ok(extraction) => (extraction.profile, Some(extraction.result), None),
            Err(e) => (None, e.partial().cloned(), Some(e.to_string())),
        },
        Err(e) => return ProcessResult::failed(path, e.to_string()),
    };

    ProcessResult {
        path,
        profile,
        fields,
        error,
        processing_time_ms: file_start.elapsed().as_millis() as u64,
    }
}

/// One row per document: file name, then every field in output order.
fn write_table<W: io::Write>(mut wtr: csv::Writer<W>, results: &[ProcessResult]) -> anyhow::Result<()> {
    wtr.write_record(std::iter::once("filename").chain(Field::ALL.iter().map(|f| f.as_str())))?;

    for result in results {
        let row = match &result.fields {
            Some(fields) => fields.to_row(),
            None => vec![String::new(); Field::ALL.len()],
        };
        wtr.write_record(std::iter::once(result.filename()).chain(row))?;
        debug!(
            "{}: {} in {}ms",
            result.filename(),
            result.profile.as_deref().unwrap_or("generic"),
            result.processing_time_ms
        );
    }

    wtr.flush()?;
    Ok(())
}

fn write_failures(path: &Path, failed: &[&ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["filename", "error", "processing_time_ms"])?;
    for result in failed {
        wtr.write_record([
            result.filename(),
            result.error.clone().unwrap_or_default(),
            result.processing_time_ms.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        fs::write(dir.path().join("a.TXT"), "x").unwrap();
        fs::write(dir.path().join("c.pdf"), "x").unwrap();

        let files = collect_files(dir.path().to_str().unwrap(), &["txt".to_string()]).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);
    }

    #[test]
    fn test_failed_document_keeps_partial_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.txt");
        fs::write(&path, "FACTURA Nº 9\nFecha 03/04/2024\n").unwrap();

        let pipeline = ExtractionPipeline::from_config(&Default::default()).unwrap();
        let result = process_single_file(path, &pipeline);

        assert!(result.error.is_some());
        let fields = result.fields.unwrap();
        assert_eq!(fields.text(Field::InvoiceNumber), Some("9"));
    }

    #[tokio::test]
    async fn test_panicking_worker_becomes_failed_row() {
        let path = PathBuf::from("broken.txt");
        let result = run_worker(path.clone(), |_| panic!("worker died")).await;

        assert_eq!(result.path, path);
        assert!(result.fields.is_none());
        assert!(result.error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_worker_result_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.txt");
        fs::write(&path, "Factura Nº 1\nTotal 121,00\n").unwrap();

        let pipeline = Arc::new(ExtractionPipeline::from_config(&Default::default()).unwrap());
        let result = run_worker(path, move |p| process_single_file(p, &pipeline)).await;

        assert!(result.error.is_none());
        assert_eq!(result.fields.unwrap().text(Field::InvoiceNumber), Some("1"));
    }
}
