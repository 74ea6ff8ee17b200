//! `opuskit convert` command implementation
//!
//! Transcodes `<input>/NN/<id>.mp3` to `<output>/<id>.opus`.

use super::{ensure_dir, execute, finish, load_batch, require_dir, require_program};
use crate::config::Settings;
use crate::error::Result;
use crate::{BatchArgs, CodecArgs};
use opuskit_pipeline::{Operation, Transcode, WorkItem};
use std::path::Path;
use std::sync::Arc;

/// Convert sources under `input` into `output`
pub async fn run(
    settings: &Settings,
    input: &Path,
    output: &Path,
    codec: &CodecArgs,
    batch: &BatchArgs,
) -> Result<()> {
    let config = codec
        .apply(settings.pipeline_config(batch))
        .input_dir(input)
        .output_dir(output);
    config.validate()?;
    require_dir(&config.input_dir, "input")?;
    let codec_program = require_program(&config.codec_program)?;
    ensure_dir(&config.output_dir)?;

    let items = load_batch(settings, batch)?;
    let operation: Arc<dyn Operation<WorkItem>> = Arc::new(
        Transcode::new(
            &config.input_dir,
            &config.output_dir,
            codec_program,
            config.bitrate_kbps,
        )
        .with_timeout(config.tool_timeout),
    );
    let report = execute(
        items,
        config.workers,
        operation,
        settings.show_progress(batch.no_progress),
    )
    .await?;

    finish(&report, &config.manifest_path)
}
