//! `opuskit run` command implementation
//!
//! Downloads and converts each track in a single pass: for every track the
//! blob is fetched if its source is missing, then the source is transcoded.

use super::{ensure_dir, execute, finish, load_batch, require_program};
use crate::config::Settings;
use crate::error::Result;
use crate::{BatchArgs, CodecArgs, FetchArgs};
use opuskit_pipeline::{build_fetcher, Chain, Fetch, FetcherKind, Operation, Transcode, WorkItem};
use std::path::Path;
use std::sync::Arc;

/// Fetch then transcode every catalogued track
pub async fn run(
    settings: &Settings,
    input: &Path,
    output: &Path,
    fetch: &FetchArgs,
    codec: &CodecArgs,
    batch: &BatchArgs,
) -> Result<()> {
    let mut fetcher_config = fetch.fetcher_config();
    if fetcher_config.kind == FetcherKind::Command {
        fetcher_config.program = require_program(&fetcher_config.program)?;
    }
    let config = codec
        .apply(settings.pipeline_config(batch))
        .input_dir(input)
        .output_dir(output)
        .fetcher(fetcher_config);
    config.validate()?;
    let codec_program = require_program(&config.codec_program)?;
    ensure_dir(&config.input_dir)?;
    ensure_dir(&config.output_dir)?;

    let items = load_batch(settings, batch)?;
    let fetcher = build_fetcher(&config.fetcher, config.tool_timeout)?;
    let chain = Chain::new("fetch+transcode")
        .then(Fetch::new(&config.input_dir, fetcher))
        .then(
            Transcode::new(
                &config.input_dir,
                &config.output_dir,
                codec_program,
                config.bitrate_kbps,
            )
            .with_timeout(config.tool_timeout),
        );
    let operation: Arc<dyn Operation<WorkItem>> = Arc::new(chain);
    let report = execute(
        items,
        config.workers,
        operation,
        settings.show_progress(batch.no_progress),
    )
    .await?;

    finish(&report, &config.manifest_path)
}
