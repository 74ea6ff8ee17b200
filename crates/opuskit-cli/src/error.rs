//! Error types for the opuskit CLI
//!
//! Only setup problems surface here. Per-track failures are summarized and
//! written to the failure manifest instead.

use opuskit_pipeline::{FilterError, ItemError, PipelineError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// User-facing CLI errors with actionable messages
#[derive(Error, Debug)]
pub enum CliError {
    /// Catalog file is missing or malformed
    #[error("Catalog error: {0}. Check the --catalog path (or OPUSKIT_CATALOG) and the file contents.")]
    Catalog(String),

    /// A required directory does not exist
    #[error("Directory not found: {what} directory '{path}'. Create it or pass the correct path.")]
    MissingDirectory { what: String, path: PathBuf },

    /// External program could not be located
    #[error("Executable not found: '{0}'. Install it or pass its path explicitly.")]
    MissingExecutable(String),

    /// --filter expression could not be parsed
    #[error("Invalid filter: {0}. Expected comma-separated clauses like 'archive_nr<10,genre=rock'.")]
    Filter(#[from] FilterError),

    /// Flag values are out of range or inconsistent
    #[error("Configuration error: {0}. Check the command-line flags and OPUSKIT_* environment variables.")]
    Config(String),

    /// Shard extraction failed
    #[error("Archive error: {0}")]
    Archive(#[from] ItemError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Other pipeline failure
    #[error("Pipeline error: {0}")]
    Pipeline(PipelineError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing directory error
    pub fn missing_directory(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory {
            what: what.into(),
            path: path.into(),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::CatalogLoad { path, reason } => {
                Self::Catalog(format!("'{}': {}", path.display(), reason))
            }
            PipelineError::Filter(e) => Self::Filter(e),
            PipelineError::Setup(msg) => Self::Config(msg),
            PipelineError::Io(e) => Self::Io(e),
            other => Self::Pipeline(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_is_actionable() {
        let err: CliError = PipelineError::catalog_load("tracks.csv", "file not found").into();
        let msg = err.to_string();
        assert!(msg.contains("tracks.csv"));
        assert!(msg.contains("--catalog"));
    }

    #[test]
    fn test_setup_error_maps_to_config() {
        let err: CliError = PipelineError::setup("workers must be at least 1").into();
        assert!(matches!(err, CliError::Config(_)));
    }
}
