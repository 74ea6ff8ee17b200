//! opuskit CLI Library
//!
//! Command-line interface for batch-converting the track dataset to Opus.
//!
//! # Overview
//!
//! - **Download**: fetch and unpack source archives (`opuskit download`)
//! - **Convert**: transcode sources to Opus (`opuskit convert`)
//! - **Verify**: check sources against catalogued SHA-256 digests (`opuskit verify`)
//! - **Pack / Unpack**: build and extract per-shard tar archives (`opuskit pack`, `opuskit unpack`)
//! - **Run**: download and convert in one pass (`opuskit run`)
//!
//! Every run over the catalog writes a failure manifest that can be fed back
//! with `--retry-from`.

pub mod commands;
pub mod config;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use config::Settings;
pub use error::{CliError, Result};

use clap::{Args, Parser, Subcommand, ValueEnum};
use opuskit_pipeline::config::{
    DEFAULT_BITRATE_KBPS, DEFAULT_CATALOG_FILE, DEFAULT_CODEC_PROGRAM, DEFAULT_DOWNLOAD_ARGS,
    DEFAULT_DOWNLOAD_PROGRAM, DEFAULT_DOWNLOAD_URL_TEMPLATE, DEFAULT_MANIFEST_FILE,
    DEFAULT_TOOL_TIMEOUT_SECS, DEFAULT_WORKERS,
};
use opuskit_pipeline::FetcherKind;
use std::path::PathBuf;

/// opuskit - batch MP3 to Opus dataset converter
#[derive(Parser, Debug)]
#[command(name = "opuskit")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Track catalog (.csv, .jsonl, .ndjson or .json)
    #[arg(long, env = "OPUSKIT_CATALOG", default_value = DEFAULT_CATALOG_FILE, global = true)]
    pub catalog: PathBuf,

    /// Timeout for each external tool invocation, in seconds
    #[arg(long, env = "OPUSKIT_TOOL_TIMEOUT", default_value_t = DEFAULT_TOOL_TIMEOUT_SECS, global = true)]
    pub tool_timeout: u64,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and unpack the source archives of every catalogued track
    Download {
        /// Source directory the archives are unpacked into (created if missing)
        #[arg(short, long, env = "OPUSKIT_INPUT")]
        input: PathBuf,

        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Convert source files to Opus
    Convert {
        /// Source directory (`<input>/NN/<id>.mp3`)
        #[arg(short, long, env = "OPUSKIT_INPUT")]
        input: PathBuf,

        /// Directory for `<id>.opus` files (created if missing)
        #[arg(short, long, env = "OPUSKIT_OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        codec: CodecArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Verify source files against their catalogued SHA-256
    Verify {
        /// Source directory (`<input>/NN/<id>.mp3`)
        #[arg(short, long, env = "OPUSKIT_INPUT")]
        input: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Pack converted files into one tar archive per shard
    Pack {
        /// Directory holding `<id>.opus` files
        #[arg(long, env = "OPUSKIT_OUTPUT")]
        opus: PathBuf,

        /// Destination directory for `<shard>.tar` archives
        #[arg(long)]
        to: PathBuf,

        /// Optional subdirectory of --to (e.g. train, validation)
        #[arg(long)]
        split: Option<String>,

        /// Number of parallel workers
        #[arg(short, long, env = "OPUSKIT_WORKERS", default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// Only pack tracks matching this filter expression
        #[arg(long)]
        filter: Option<String>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Extract every shard archive in a directory
    Unpack {
        /// Directory containing `*.tar` shard archives
        #[arg(long)]
        dir: PathBuf,

        /// Destination directory (created if missing)
        #[arg(long)]
        out: PathBuf,
    },

    /// Download and convert each track in one pass
    Run {
        /// Source directory the archives are unpacked into (created if missing)
        #[arg(short, long, env = "OPUSKIT_INPUT")]
        input: PathBuf,

        /// Directory for `<id>.opus` files (created if missing)
        #[arg(short, long, env = "OPUSKIT_OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        codec: CodecArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },
}

/// Options shared by every batch run over the catalog
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Number of parallel workers
    #[arg(short, long, env = "OPUSKIT_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Filter expression, e.g. "archive_nr<10,genre=rock"
    #[arg(long)]
    pub filter: Option<String>,

    /// Only process the ids listed in a previous failure manifest
    #[arg(long, value_name = "MANIFEST")]
    pub retry_from: Option<PathBuf>,

    /// Where to write the ids of failed tracks
    #[arg(long, env = "OPUSKIT_MANIFEST", default_value = DEFAULT_MANIFEST_FILE)]
    pub manifest: PathBuf,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Codec tool options
#[derive(Args, Debug, Clone)]
pub struct CodecArgs {
    /// ffmpeg executable (name on PATH or a path)
    #[arg(long, env = "OPUSKIT_FFMPEG", default_value = DEFAULT_CODEC_PROGRAM)]
    pub ffmpeg: PathBuf,

    /// Opus bitrate in kbit/s
    #[arg(short, long, env = "OPUSKIT_BITRATE", default_value_t = DEFAULT_BITRATE_KBPS)]
    pub bitrate: u32,
}

/// How source archives are downloaded
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Download client
    #[arg(long, value_enum, env = "OPUSKIT_FETCHER", default_value_t = FetcherChoice::Command)]
    pub fetcher: FetcherChoice,

    /// URL template for the http fetcher; `{id}` is replaced by the blob id
    #[arg(long, env = "OPUSKIT_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL_TEMPLATE)]
    pub url_template: String,

    /// Executable for the command fetcher
    #[arg(long, env = "OPUSKIT_DOWNLOADER", default_value = DEFAULT_DOWNLOAD_PROGRAM)]
    pub downloader: PathBuf,

    /// Arguments for the command fetcher; `{id}` and `{output}` are substituted
    #[arg(
        long,
        env = "OPUSKIT_DOWNLOADER_ARGS",
        default_value = DEFAULT_DOWNLOAD_ARGS,
        allow_hyphen_values = true
    )]
    pub downloader_args: String,
}

/// Download client selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherChoice {
    /// Stream the blob over HTTP(S) from a mirror serving archives directly
    Http,
    /// Run an external download client (`gdown` by default)
    Command,
}

impl From<FetcherChoice> for FetcherKind {
    fn from(choice: FetcherChoice) -> Self {
        match choice {
            FetcherChoice::Http => FetcherKind::Http,
            FetcherChoice::Command => FetcherKind::Command,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_defaults() {
        let cli = Cli::try_parse_from([
            "opuskit", "convert", "--input", "mp3", "--output", "opus",
        ])
        .unwrap();

        match cli.command {
            Commands::Convert { codec, batch, .. } => {
                assert_eq!(codec.bitrate, 64);
                assert_eq!(batch.workers, 1);
                assert_eq!(batch.manifest, PathBuf::from("missing-tasks.txt"));
                assert!(batch.retry_from.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "opuskit", "verify", "--input", "mp3", "--catalog", "t.jsonl", "--tool-timeout", "5", "-v",
        ])
        .unwrap();
        assert_eq!(cli.catalog, PathBuf::from("t.jsonl"));
        assert_eq!(cli.tool_timeout, 5);
        assert!(cli.verbose);
    }

    #[test]
    fn test_fetcher_defaults_to_command() {
        let cli = Cli::try_parse_from(["opuskit", "download", "--input", "mp3"]).unwrap();
        match cli.command {
            Commands::Download { fetch, .. } => {
                assert_eq!(fetch.fetcher, FetcherChoice::Command);
                assert_eq!(fetch.downloader, PathBuf::from("gdown"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_fetcher_choice() {
        let cli = Cli::try_parse_from([
            "opuskit",
            "download",
            "--input",
            "mp3",
            "--fetcher",
            "command",
            "--downloader-args",
            "--id {id} -O {output}",
        ])
        .unwrap();
        match cli.command {
            Commands::Download { fetch, .. } => {
                assert_eq!(FetcherKind::from(fetch.fetcher), FetcherKind::Command);
                assert_eq!(fetch.downloader_args, "--id {id} -O {output}");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
