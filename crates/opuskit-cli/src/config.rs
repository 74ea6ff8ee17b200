//! Run settings derived from the global CLI flags

use crate::{BatchArgs, Cli, CodecArgs, FetchArgs};
use opuskit_common::logging::{LogConfig, LogLevel, LogOutput};
use opuskit_pipeline::{FetcherConfig, PipelineConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of rolling log files written by the CLI
pub const LOG_FILE_PREFIX: &str = "opuskit";

/// Settings that apply to every subcommand
#[derive(Debug, Clone)]
pub struct Settings {
    /// Track catalog path
    pub catalog: PathBuf,

    /// Watchdog timeout for external tools
    pub tool_timeout: Duration,

    /// Enable verbose output
    pub verbose: bool,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            catalog: cli.catalog.clone(),
            tool_timeout: Duration::from_secs(cli.tool_timeout),
            verbose: cli.verbose,
        }
    }

    /// Logging defaults: debug when verbose, otherwise warnings and errors only
    pub fn log_config(&self) -> LogConfig {
        let level = if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };
        LogConfig::default()
            .with_level(level)
            .with_output(LogOutput::Console)
            .with_file_prefix(LOG_FILE_PREFIX)
    }

    /// Base pipeline configuration carrying the global settings
    pub fn pipeline_config(&self, batch: &BatchArgs) -> PipelineConfig {
        PipelineConfig::new()
            .tool_timeout(self.tool_timeout)
            .workers(batch.workers)
            .manifest_path(&batch.manifest)
    }

    /// Progress bars are hidden in verbose mode so log lines stay readable
    pub fn show_progress(&self, no_progress: bool) -> bool {
        !self.verbose && !no_progress
    }
}

impl CodecArgs {
    pub fn apply(&self, config: PipelineConfig) -> PipelineConfig {
        config
            .codec_program(&self.ffmpeg)
            .bitrate_kbps(self.bitrate)
    }
}

impl FetchArgs {
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            kind: self.fetcher.into(),
            url_template: self.url_template.clone(),
            program: self.downloader.clone(),
            args: self.downloader_args.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::Commands;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_log_level_follows_verbose() {
        let quiet = Settings::from_cli(&parse(&["opuskit", "unpack", "--dir", "a", "--out", "b"]));
        assert_eq!(quiet.log_config().level, LogLevel::Warn);
        assert!(quiet.show_progress(false));
        assert!(!quiet.show_progress(true));

        let loud = Settings::from_cli(&parse(&["opuskit", "-v", "unpack", "--dir", "a", "--out", "b"]));
        assert_eq!(loud.log_config().level, LogLevel::Debug);
        assert_eq!(loud.log_config().log_file_prefix, "opuskit");
        assert!(!loud.show_progress(false));
    }

    #[test]
    fn test_pipeline_config_from_flags() {
        let cli = parse(&[
            "opuskit", "--tool-timeout", "30", "convert", "-i", "in", "-o", "out", "-w", "3", "-b", "96",
        ]);
        let settings = Settings::from_cli(&cli);
        let Commands::Convert { codec, batch, .. } = &cli.command else {
            panic!("expected convert");
        };

        let config = codec.apply(settings.pipeline_config(batch));
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.workers, 3);
        assert_eq!(config.bitrate_kbps, 96);
        assert!(config.validate().is_ok());
    }
}
