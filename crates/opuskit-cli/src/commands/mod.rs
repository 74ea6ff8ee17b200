//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. The helpers
//! below cover what every batch command shares: loading and filtering the
//! catalog, running the executor behind a progress bar, and reporting.

pub mod convert;
pub mod download;
pub mod pack;
pub mod run;
pub mod unpack;
pub mod verify;

use crate::config::Settings;
use crate::error::{CliError, Result};
use crate::progress::BatchProgress;
use crate::BatchArgs;
use colored::Colorize;
use indicatif::HumanDuration;
use opuskit_pipeline::config::resolve_program;
use opuskit_pipeline::{
    partition, read_failure_manifest, Catalog, Executor, Operation, RunReport, TrackFilter,
    WorkItem, WorkUnit,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Fail unless `path` is an existing directory
pub(crate) fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CliError::missing_directory(what, path))
    }
}

/// Create `path` (and parents) if it does not exist yet
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Locate an external program on PATH or at the given path
pub(crate) fn require_program(program: &Path) -> Result<PathBuf> {
    resolve_program(program).map_err(|_| CliError::MissingExecutable(program.display().to_string()))
}

/// Build the track filter from `--filter` and `--retry-from`
pub(crate) fn build_filter(expr: Option<&str>, retry_from: Option<&Path>) -> Result<TrackFilter> {
    let mut filter = match expr {
        Some(expr) => TrackFilter::parse(expr)?,
        None => TrackFilter::all(),
    };
    if let Some(manifest) = retry_from {
        let ids = read_failure_manifest(manifest)?;
        println!(
            "{} Retrying {} track(s) listed in {}",
            "→".cyan(),
            ids.len(),
            manifest.display()
        );
        filter = filter.with_ids(ids);
    }
    Ok(filter)
}

/// Load the catalog and apply the filter
pub(crate) fn load_items(settings: &Settings, filter: &TrackFilter) -> Result<Vec<WorkItem>> {
    let catalog = Catalog::open(&settings.catalog)?;
    let items = catalog.load_filtered(|item| filter.matches(item))?;
    println!(
        "{} Loaded {} track(s) from {} ({})",
        "✓".green(),
        items.len(),
        catalog.path().display(),
        filter
    );
    Ok(items)
}

/// Load the catalog for a batch run
pub(crate) fn load_batch(settings: &Settings, batch: &BatchArgs) -> Result<Vec<WorkItem>> {
    let filter = build_filter(batch.filter.as_deref(), batch.retry_from.as_deref())?;
    load_items(settings, &filter)
}

/// Partition `units`, run `operation` over them and return the report
pub(crate) async fn execute<U: WorkUnit>(
    units: Vec<U>,
    workers: usize,
    operation: Arc<dyn Operation<U>>,
    show_progress: bool,
) -> Result<RunReport> {
    let name = operation.name();
    let partitions = partition(units, workers)?;
    let total = partitions.total_units() as u64;

    let progress = Arc::new(BatchProgress::new(
        total,
        &format!("{} x{}", name, workers),
        show_progress,
    ));
    let observer = Arc::clone(&progress);
    let executor = Executor::new().with_observer(move |result| observer.observe(result));

    let started = Instant::now();
    let report = executor.run(partitions, operation).await;
    progress.finish();

    info!(operation = name, elapsed_ms = started.elapsed().as_millis() as u64, "Batch finished");
    println!(
        "{} {} finished in {}",
        "✓".green(),
        name,
        HumanDuration(started.elapsed())
    );
    Ok(report)
}

/// Print the summary lines for a finished run
pub(crate) fn print_report(report: &RunReport) {
    let marker = if report.failed() == 0 {
        "✓".green()
    } else {
        "!".yellow()
    };
    println!("{} {}", marker, report.summary());
    println!(
        "  {} completed, {} already done",
        report.completed(),
        report.skipped()
    );
    for (kind, count) in report.failures_by_kind() {
        println!("  {} {}: {}", "✗".red(), kind, count);
    }
}

/// Print the summary and write the failure manifest
pub(crate) fn finish(report: &RunReport, manifest: &Path) -> Result<()> {
    print_report(report);
    report.write_failure_manifest(manifest)?;
    if report.failed() > 0 {
        println!(
            "{} Failed ids written to {}; rerun with --retry-from {}",
            "→".cyan(),
            manifest.display(),
            manifest.display()
        );
    }
    Ok(())
}
