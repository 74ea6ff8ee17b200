//! Pipeline configuration
//!
//! Everything a run needs is passed explicitly through [`PipelineConfig`];
//! there are no process-wide defaults beyond the constants below.

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Opus target bitrate in kbit/s
pub const DEFAULT_BITRATE_KBPS: u32 = 64;

/// Lowest and highest bitrate libopus accepts, in kbit/s
pub const MIN_BITRATE_KBPS: u32 = 6;
pub const MAX_BITRATE_KBPS: u32 = 510;

/// Number of parallel workers
pub const DEFAULT_WORKERS: usize = 1;

/// Codec executable, looked up on `PATH` when not a path
pub const DEFAULT_CODEC_PROGRAM: &str = "ffmpeg";

/// Watchdog timeout for every external tool invocation (1 hour)
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 3600;

/// File the failed ids are written to
pub const DEFAULT_MANIFEST_FILE: &str = "missing-tasks.txt";

/// Catalog file read when none is given
pub const DEFAULT_CATALOG_FILE: &str = "tracks.csv";

/// Download URL template for the HTTP fetcher; `{id}` is the blob id
pub const DEFAULT_DOWNLOAD_URL_TEMPLATE: &str = "https://drive.google.com/uc?export=download&id={id}";

/// External download client used by the command fetcher
pub const DEFAULT_DOWNLOAD_PROGRAM: &str = "gdown";

/// Argument template for the command fetcher
pub const DEFAULT_DOWNLOAD_ARGS: &str = "{id} -O {output}";

/// Which [`BlobFetcher`](crate::fetcher::BlobFetcher) a run uses
///
/// Google Drive answers large downloads with an HTML confirmation page, so
/// the default is the external `gdown` client. Plain HTTP suits mirrors that
/// serve the archives directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetcherKind {
    Http,
    #[default]
    Command,
}

/// Blob download settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    pub kind: FetcherKind,
    /// URL template with an `{id}` placeholder
    pub url_template: String,
    pub program: PathBuf,
    /// Whitespace-separated arguments with `{id}` and `{output}` placeholders
    pub args: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            kind: FetcherKind::default(),
            url_template: DEFAULT_DOWNLOAD_URL_TEMPLATE.to_string(),
            program: PathBuf::from(DEFAULT_DOWNLOAD_PROGRAM),
            args: DEFAULT_DOWNLOAD_ARGS.to_string(),
        }
    }
}

impl FetcherConfig {
    /// Split the argument template into individual arguments
    pub fn arg_template(&self) -> Vec<String> {
        self.args.split_whitespace().map(str::to_string).collect()
    }

    pub fn validate(&self) -> Result<()> {
        match self.kind {
            FetcherKind::Http => {
                if !self.url_template.contains("{id}") {
                    return Err(PipelineError::setup(format!(
                        "download URL template '{}' has no {{id}} placeholder",
                        self.url_template
                    )));
                }
            }
            FetcherKind::Command => {
                let args = self.arg_template();
                if !args.iter().any(|a| a.contains("{output}")) {
                    return Err(PipelineError::setup(format!(
                        "download arguments '{}' have no {{output}} placeholder",
                        self.args
                    )));
                }
                if !args.iter().any(|a| a.contains("{id}")) {
                    return Err(PipelineError::setup(format!(
                        "download arguments '{}' have no {{id}} placeholder",
                        self.args
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the source tree (`<input>/NN/<id>.mp3`)
    pub input_dir: PathBuf,
    /// Flat directory of converted artifacts
    pub output_dir: PathBuf,
    pub codec_program: PathBuf,
    pub bitrate_kbps: u32,
    pub workers: usize,
    pub tool_timeout: Duration,
    pub manifest_path: PathBuf,
    pub fetcher: FetcherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            codec_program: PathBuf::from(DEFAULT_CODEC_PROGRAM),
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            workers: DEFAULT_WORKERS,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_FILE),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn codec_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.codec_program = program.into();
        self
    }

    pub fn bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn fetcher(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Check value ranges; does not touch the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PipelineError::setup("workers must be at least 1"));
        }

        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&self.bitrate_kbps) {
            return Err(PipelineError::setup(format!(
                "bitrate {}k is outside the supported range {}k-{}k",
                self.bitrate_kbps, MIN_BITRATE_KBPS, MAX_BITRATE_KBPS
            )));
        }

        if self.tool_timeout.is_zero() {
            return Err(PipelineError::setup("tool timeout must be greater than zero"));
        }

        self.fetcher.validate()
    }
}

/// Resolve an executable: paths are checked as given, bare names are searched on `PATH`
pub fn resolve_program(program: &Path) -> Result<PathBuf> {
    let missing = || {
        PipelineError::setup(format!(
            "executable '{}' not found",
            program.display()
        ))
    };

    if program.components().count() > 1 || program.is_absolute() {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(missing())
        };
    }

    let search_path = std::env::var_os("PATH").ok_or_else(missing)?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .ok_or_else(missing)
}
