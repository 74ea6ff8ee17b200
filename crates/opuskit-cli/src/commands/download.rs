//! `opuskit download` command implementation
//!
//! Fetches the source archive of every catalogued track and unpacks it into
//! the input directory. Archives already unpacked are not downloaded again.

use super::{ensure_dir, execute, finish, load_batch, require_program};
use crate::config::Settings;
use crate::error::Result;
use crate::{BatchArgs, FetchArgs};
use opuskit_pipeline::{build_fetcher, Fetch, FetcherKind, Operation, WorkItem};
use std::path::Path;
use std::sync::Arc;

/// Download sources into `input`
pub async fn run(
    settings: &Settings,
    input: &Path,
    fetch: &FetchArgs,
    batch: &BatchArgs,
) -> Result<()> {
    let mut fetcher_config = fetch.fetcher_config();
    if fetcher_config.kind == FetcherKind::Command {
        fetcher_config.program = require_program(&fetcher_config.program)?;
    }
    let config = settings
        .pipeline_config(batch)
        .input_dir(input)
        .fetcher(fetcher_config);
    config.validate()?;
    ensure_dir(&config.input_dir)?;

    let items = load_batch(settings, batch)?;
    let fetcher = build_fetcher(&config.fetcher, config.tool_timeout)?;
    let operation: Arc<dyn Operation<WorkItem>> = Arc::new(Fetch::new(&config.input_dir, fetcher));
    let report = execute(
        items,
        config.workers,
        operation,
        settings.show_progress(batch.no_progress),
    )
    .await?;

    finish(&report, &config.manifest_path)
}
