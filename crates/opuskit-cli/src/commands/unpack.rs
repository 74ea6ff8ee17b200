//! `opuskit unpack` command implementation

use super::{ensure_dir, require_dir};
use crate::error::{CliError, Result};
use crate::progress;
use colored::Colorize;
use indicatif::HumanBytes;
use opuskit_pipeline::archive::unpack_dir;
use std::path::Path;

/// Extract every `*.tar` in `dir` into `out`
pub async fn run(dir: &Path, out: &Path) -> Result<()> {
    require_dir(dir, "shard archive")?;
    ensure_dir(out)?;

    let spinner = progress::spinner(&format!("Unpacking shards from {}", dir.display()));
    let (dir_owned, out_owned) = (dir.to_path_buf(), out.to_path_buf());
    let reports = tokio::task::spawn_blocking(move || unpack_dir(&dir_owned, &out_owned))
        .await
        .map_err(|e| CliError::Other(e.into()))??;
    spinner.finish_and_clear();

    let files: usize = reports.iter().map(|(_, r)| r.files).sum();
    let bytes: u64 = reports.iter().map(|(_, r)| r.bytes).sum();
    println!(
        "{} Unpacked {} archive(s): {} file(s), {}",
        "✓".green(),
        reports.len(),
        files,
        HumanBytes(bytes)
    );
    Ok(())
}
