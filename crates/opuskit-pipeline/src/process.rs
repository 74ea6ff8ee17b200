//! External tool invocation with a watchdog

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {seconds}s")]
    TimedOut { program: String, seconds: u64 },
}

/// An external program run with stdio detached and a hard time limit
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run to completion; the child is killed if the timeout expires
    pub async fn run(&self) -> Result<ExitStatus, ToolError> {
        let program = self.program.display().to_string();
        debug!(program = %program, args = ?self.args, "Spawning tool");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(source)) => Err(ToolError::Wait { program, source }),
            Err(_) => {
                warn!(program = %program, timeout_secs = self.timeout.as_secs(), "Tool timed out, killing");
                if let Err(e) = child.kill().await {
                    warn!(program = %program, error = %e, "Failed to kill timed out tool");
                }
                Err(ToolError::TimedOut {
                    program,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}
