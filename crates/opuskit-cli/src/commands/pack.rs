//! `opuskit pack` command implementation
//!
//! Groups catalogued tracks by shard number and writes one tar per shard.
//! A shard is only packed when every one of its tracks has been converted.

use super::{build_filter, ensure_dir, execute, load_items, print_report, require_dir};
use crate::config::Settings;
use crate::error::{CliError, Result};
use colored::Colorize;
use opuskit_pipeline::{Operation, Pack, ShardBundle};
use std::path::Path;
use std::sync::Arc;

/// Arguments of `opuskit pack`
#[derive(Debug, Clone)]
pub struct PackOptions<'a> {
    pub opus: &'a Path,
    pub to: &'a Path,
    pub split: Option<&'a str>,
    pub workers: usize,
    pub filter: Option<&'a str>,
    pub no_progress: bool,
}

/// Pack converted files into shard archives
pub async fn run(settings: &Settings, options: PackOptions<'_>) -> Result<()> {
    if options.workers == 0 {
        return Err(CliError::config("workers must be at least 1"));
    }
    require_dir(options.opus, "opus")?;

    let pack = Pack::new(options.opus, options.to, options.split);
    ensure_dir(options.to)?;

    let filter = build_filter(options.filter, None)?;
    let bundles = ShardBundle::group(load_items(settings, &filter)?);
    println!("{} {} shard(s) to pack", "→".cyan(), bundles.len());

    let operation: Arc<dyn Operation<ShardBundle>> = Arc::new(pack);
    let report = execute(
        bundles,
        options.workers,
        operation,
        settings.show_progress(options.no_progress),
    )
    .await?;

    print_report(&report);
    let failed = report.failed_ids();
    if !failed.is_empty() {
        let shards: Vec<String> = failed.iter().map(u64::to_string).collect();
        println!("{} Incomplete shards: {}", "→".cyan(), shards.join(", "));
    }
    Ok(())
}
