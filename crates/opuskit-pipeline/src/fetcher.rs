//! Blob download clients
//!
//! A [`BlobFetcher`] writes the raw bytes of one remote blob to a local path.
//! Extraction and completion markers are handled by the Fetch operation.

use crate::config::{FetcherConfig, FetcherKind};
use crate::error::{ItemError, PipelineError, Result};
use crate::process::{ToolCommand, ToolError};
use async_trait::async_trait;
use futures::StreamExt;
use opuskit_common::fs::is_nonempty_file;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Downloads a blob by id to a local file
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Write blob `blob_id` to `destination`, returning the number of bytes written
    async fn fetch(&self, blob_id: &str, destination: &Path) -> std::result::Result<u64, ItemError>;
}

/// Streams blobs over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpBlobFetcher {
    client: reqwest::Client,
    url_template: String,
}

impl HttpBlobFetcher {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("opuskit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::setup(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, blob_id: &str) -> String {
        self.url_template.replace("{id}", blob_id)
    }
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, blob_id: &str, destination: &Path) -> std::result::Result<u64, ItemError> {
        let url = self.url_for(blob_id);
        debug!(blob_id, url = %url, "Requesting blob");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ItemError::download(blob_id, e))?;

        if is_html(&response) {
            return Err(ItemError::download(
                blob_id,
                "server answered with an HTML page instead of the archive \
                 (Google Drive needs the command fetcher for large files)",
            ));
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| ItemError::io(destination, e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ItemError::download(blob_id, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ItemError::io(destination, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| ItemError::io(destination, e))?;

        if written == 0 {
            return Err(ItemError::download(blob_id, "empty response body"));
        }
        Ok(written)
    }
}

fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

/// Delegates downloads to an external client such as `gdown`
#[derive(Debug, Clone)]
pub struct CommandBlobFetcher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBlobFetcher {
    /// `args` may contain `{id}` and `{output}` placeholders
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn render_args(&self, blob_id: &str, destination: &Path) -> Vec<String> {
        let output = destination.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{id}", blob_id).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl BlobFetcher for CommandBlobFetcher {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn fetch(&self, blob_id: &str, destination: &Path) -> std::result::Result<u64, ItemError> {
        let status = ToolCommand::new(&self.program, self.timeout)
            .args(self.render_args(blob_id, destination))
            .run()
            .await
            .map_err(|e| match e {
                ToolError::TimedOut { program, seconds } => ItemError::Timeout { program, seconds },
                other => ItemError::download(blob_id, other),
            })?;

        if !status.success() {
            return Err(ItemError::download(
                blob_id,
                format!("{} exited with {}", self.program.display(), status),
            ));
        }

        if !is_nonempty_file(destination) {
            return Err(ItemError::download(blob_id, "download client produced no file"));
        }

        let metadata = tokio::fs::metadata(destination)
            .await
            .map_err(|e| ItemError::io(destination, e))?;
        Ok(metadata.len())
    }
}

/// Build the fetcher selected by `config`
pub fn build_fetcher(config: &FetcherConfig, timeout: Duration) -> Result<Arc<dyn BlobFetcher>> {
    config.validate()?;
    Ok(match config.kind {
        FetcherKind::Http => Arc::new(HttpBlobFetcher::new(config.url_template.clone(), timeout)?),
        FetcherKind::Command => Arc::new(CommandBlobFetcher::new(
            config.program.clone(),
            config.arg_template(),
            timeout,
        )),
    })
}
