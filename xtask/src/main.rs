//! Build automation tasks for opuskit
//!
//! Currently this generates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for opuskit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<opuskit_cli::Cli>();

    let content = format!(
        r#"# opuskit CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

opuskit batch-converts a catalogued MP3 dataset to Opus. It downloads the
source archives, verifies SHA-256 digests, transcodes with ffmpeg and packs
the results into one tar archive per shard. Work is spread over a fixed
number of workers; tracks from the same source archive always share a
worker.

Every batch run prints a `N succeeded, M failed` summary and writes the
failed track ids, one per line, to a failure manifest
(`missing-tasks.txt` by default). Feed it back with `--retry-from` to
retry only those tracks.

## Quick Start

```bash
# Fetch and unpack the source archives
opuskit download --input mp3 --workers 4

# Check the sources against the catalogued digests
opuskit verify --input mp3 --workers 4

# Transcode to Opus at 64 kbit/s
opuskit convert --input mp3 --output opus --workers 8

# Retry whatever failed in the previous run
opuskit convert --input mp3 --output opus --retry-from missing-tasks.txt

# Pack shard archives for the training split, then extract them elsewhere
opuskit pack --opus opus --to shards --split train
opuskit unpack --dir shards/train --out restored
```

`opuskit run` downloads and converts each track in a single pass.

## Filters

`--filter` takes comma-separated clauses joined with AND, for example
`archive_nr<10,main_genre=rock`. Numeric fields accept `=`, `!=`, `<`,
`<=`, `>` and `>=`; text fields and tag sets accept `=` and `!=`.

## Commands

{}

## Environment Variables

- `OPUSKIT_CATALOG` - Track catalog (default: `tracks.csv`)
- `OPUSKIT_INPUT` / `OPUSKIT_OUTPUT` - Source and Opus directories
- `OPUSKIT_WORKERS` - Number of parallel workers (default: `1`)
- `OPUSKIT_MANIFEST` - Failure manifest path (default: `missing-tasks.txt`)
- `OPUSKIT_FFMPEG` / `OPUSKIT_BITRATE` - Codec program and bitrate
- `OPUSKIT_TOOL_TIMEOUT` - Timeout per external tool run, in seconds
- `OPUSKIT_FETCHER` - `command` (default, runs `gdown`) or `http` for mirrors serving archives directly
- `OPUSKIT_DOWNLOAD_URL` - URL template for the http fetcher
- `OPUSKIT_DOWNLOADER` / `OPUSKIT_DOWNLOADER_ARGS` - Download client for the command fetcher
- `OPUSKIT_LOG_LEVEL`, `OPUSKIT_LOG_OUTPUT`, `OPUSKIT_LOG_FORMAT`, `OPUSKIT_LOG_DIR`, `OPUSKIT_LOG_FILTER` - Logging

Variables can also be placed in a `.env` file in the working directory.

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
