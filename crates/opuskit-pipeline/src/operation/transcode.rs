use super::{Operation, Outcome};
use crate::config::DEFAULT_TOOL_TIMEOUT_SECS;
use crate::error::ItemError;
use crate::item::WorkItem;
use crate::process::{ToolCommand, ToolError};
use async_trait::async_trait;
use opuskit_common::fs::StagedFile;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const OGG_CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Whether `path` begins with an Ogg page header
pub fn is_ogg_stream(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|()| &magic == OGG_CAPTURE_PATTERN)
        .unwrap_or(false)
}

/// Converts `<input>/NN/<id>.mp3` into `<output>/<id>.opus` with the codec tool
#[derive(Debug, Clone)]
pub struct Transcode {
    input_dir: PathBuf,
    output_dir: PathBuf,
    codec_program: PathBuf,
    bitrate_kbps: u32,
    timeout: Duration,
}

impl Transcode {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        codec_program: impl Into<PathBuf>,
        bitrate_kbps: u32,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            codec_program: codec_program.into(),
            bitrate_kbps,
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Codec arguments: overwrite, input, Opus at the configured bitrate, Ogg container
    pub fn codec_args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-c:a".into(),
            "libopus".into(),
            "-b:a".into(),
            format!("{}k", self.bitrate_kbps).into(),
            "-f".into(),
            "opus".into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Convert one file, skipping if a valid destination already exists
    pub async fn transcode_file(&self, source: &Path, destination: &Path) -> Result<Outcome, ItemError> {
        if destination.exists() {
            if is_ogg_stream(destination) {
                debug!(path = %destination.display(), "Destination exists, skipping");
                return Ok(Outcome::Skipped);
            }
            warn!(path = %destination.display(), "Destination is not a valid Ogg stream, reconverting");
        }

        if !source.is_file() {
            return Err(ItemError::MissingSource(source.to_path_buf()));
        }

        let staged = StagedFile::new(destination)?;
        let status = ToolCommand::new(&self.codec_program, self.timeout)
            .args(self.codec_args(source, staged.path()))
            .run()
            .await
            .map_err(|e| match e {
                ToolError::TimedOut { program, seconds } => ItemError::Timeout { program, seconds },
                other => ItemError::conversion(source, other),
            })?;

        if !status.success() {
            return Err(ItemError::conversion(
                source,
                format!("{} exited with {}", self.codec_program.display(), status),
            ));
        }

        if !is_ogg_stream(staged.path()) {
            return Err(ItemError::conversion(source, "codec produced no Ogg stream"));
        }

        staged.commit()?;
        Ok(Outcome::Completed)
    }
}

#[async_trait]
impl Operation<WorkItem> for Transcode {
    fn name(&self) -> &'static str {
        "transcode"
    }

    async fn apply(&self, item: &WorkItem) -> Result<Outcome, ItemError> {
        let source = item.source_path(&self.input_dir);
        let destination = item.target_path(&self.output_dir);
        self.transcode_file(&source, &destination).await
    }
}
