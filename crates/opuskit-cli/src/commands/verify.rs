//! `opuskit verify` command implementation
//!
//! Checks every catalogued source file against its SHA-256 digest.

use super::{execute, finish, load_batch, require_dir};
use crate::config::Settings;
use crate::error::Result;
use crate::BatchArgs;
use opuskit_pipeline::{Operation, Verify, WorkItem};
use std::path::Path;
use std::sync::Arc;

/// Verify sources under `input`
pub async fn run(settings: &Settings, input: &Path, batch: &BatchArgs) -> Result<()> {
    let config = settings.pipeline_config(batch).input_dir(input);
    config.validate()?;
    require_dir(&config.input_dir, "input")?;

    let items = load_batch(settings, batch)?;
    let operation: Arc<dyn Operation<WorkItem>> = Arc::new(Verify::new(&config.input_dir));
    let report = execute(
        items,
        config.workers,
        operation,
        settings.show_progress(batch.no_progress),
    )
    .await?;

    finish(&report, &config.manifest_path)
}
