//! `tracing` setup shared by the opuskit binaries
//!
//! Logs go to stderr, to a daily-rotated file, or both, as text or JSON lines.
//! Stdout is left alone so run summaries can be piped.
//!
//! Workers log with structured fields so a single track can be followed
//! through a run:
//!
//! ```rust,ignore
//! warn!(item_id = unit_id, worker, kind = err.kind(), error = %err, "Item failed");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use opuskit_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::default().with_level(LogLevel::Debug).merge_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::debug!("logging ready");
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable prefix for every logging override
pub const ENV_PREFIX: &str = "OPUSKIT_LOG_";

/// Minimum severity that is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            other => return Err(anyhow!("unknown log level '{other}'")),
        })
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, Self::Console | Self::Both)
    }

    fn file(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }
}

impl FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "console" | "stderr" => Self::Console,
            "file" => Self::File,
            "both" | "all" => Self::Both,
            other => return Err(anyhow!("unknown log output '{other}'")),
        })
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Self::Text,
            "json" => Self::Json,
            other => return Err(anyhow!("unknown log format '{other}'")),
        })
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Directory for rotated log files
    pub log_dir: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>`
    pub log_file_prefix: String,
    /// Extra `EnvFilter` directives such as `reqwest=warn,opuskit_pipeline=debug`
    pub filter_directives: Option<String>,
    pub include_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "opuskit".to_string(),
            filter_directives: None,
            include_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Apply `OPUSKIT_LOG_{LEVEL,OUTPUT,FORMAT,DIR,FILTER}` on top of `self`
    pub fn merge_env(mut self) -> Result<Self> {
        if let Some(level) = env_value("LEVEL")? {
            self.level = level;
        }
        if let Some(output) = env_value("OUTPUT")? {
            self.output = output;
        }
        if let Some(format) = env_value("FORMAT")? {
            self.format = format;
        }
        if let Some(dir) = env_value::<PathBuf>("DIR")? {
            self.log_dir = dir;
        }
        if let Some(filter) = env_value::<String>("FILTER")? {
            self.filter_directives = Some(filter);
        }
        Ok(self)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter_directives = Some(directives.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from(self.level).into())
            .from_env_lossy();

        let extra = self.filter_directives.as_deref().unwrap_or_default();
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let parsed: Directive = directive
                .parse()
                .with_context(|| format!("invalid log filter directive '{directive}'"))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Read `OPUSKIT_LOG_<suffix>`; unset or empty means no override
fn env_value<T>(suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    let name = format!("{ENV_PREFIX}{suffix}");
    match std::env::var(&name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| Into::<anyhow::Error>::into(e).context(format!("invalid value in {name}"))),
        _ => Ok(None),
    }
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Keeps the background file writer alive; drop it last to flush pending lines
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = LogGuard::default();

    if config.output.console() {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_ids(config.include_thread_ids);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("cannot create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard._file = Some(file_guard);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(config.include_thread_ids);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter()?)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}
