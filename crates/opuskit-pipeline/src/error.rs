//! Error taxonomy for the batch pipeline
//!
//! [`PipelineError`] is fatal and aborts a run before any work starts.
//! [`ItemError`] describes why a single work unit failed; it is caught at the
//! item boundary inside a worker and never aborts the batch.

use opuskit_common::CommonError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fatal pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal setup and catalog errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load catalog '{path}': {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    #[error("Invalid filter: {0}")]
    Filter(#[from] crate::filter::FilterError),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl PipelineError {
    /// Create a catalog load error
    pub fn catalog_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CatalogLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a setup error
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }
}

/// Per-item failure, recorded in the run report and the failure manifest
#[derive(Error, Debug)]
pub enum ItemError {
    /// Input file for the operation does not exist
    #[error("missing source file {0}")]
    MissingSource(PathBuf),

    /// File to be verified does not exist
    #[error("missing artifact {0}")]
    MissingArtifact(PathBuf),

    #[error("download of blob '{blob_id}' failed: {reason}")]
    DownloadFailure { blob_id: String, reason: String },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("conversion of {path} failed: {reason}")]
    ConversionFailure { path: PathBuf, reason: String },

    #[error("archive {path} is unusable: {reason}")]
    ArchiveFailure { path: PathBuf, reason: String },

    /// External tool exceeded the watchdog timeout and was killed
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("operation panicked: {0}")]
    Panicked(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] CommonError),
}

impl ItemError {
    /// Short, stable name used in logs and failure breakdowns
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::MissingSource(_) => "missing_source",
            ItemError::MissingArtifact(_) => "missing_artifact",
            ItemError::DownloadFailure { .. } => "download_failure",
            ItemError::IntegrityMismatch { .. } => "integrity_mismatch",
            ItemError::ConversionFailure { .. } => "conversion_failure",
            ItemError::ArchiveFailure { .. } => "archive_failure",
            ItemError::Timeout { .. } => "timeout",
            ItemError::Panicked(_) => "panicked",
            ItemError::Io { .. } | ItemError::Storage(_) => "io",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn download(blob_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::DownloadFailure {
            blob_id: blob_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn conversion(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ConversionFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ItemError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Panicked(err.to_string())
    }
}
