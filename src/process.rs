//! Single entry point for running the external media tools.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DubError, Result};

/// Captured result of one finished tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a tool to completion, bounded by a timeout and a cancellation token.
///
/// The child is spawned with `kill_on_drop`, so abandoning the wait on
/// timeout or cancellation also terminates the process.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    cancel: CancellationToken,
}

impl ToolRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run<I, S>(&self, program: &Path, args: I, timeout: Duration) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let tool = program.display().to_string();
        if self.cancel.is_cancelled() {
            return Err(DubError::Cancelled { tool });
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(command = ?cmd.as_std(), "spawning tool");

        let child = cmd.spawn().map_err(|source| DubError::ToolUnavailable {
            tool: tool.clone(),
            source,
        })?;

        let output = tokio::select! {
            _ = self.cancel.cancelled() => return Err(DubError::Cancelled { tool }),
            res = tokio::time::timeout(timeout, child.wait_with_output()) => match res {
                Ok(out) => out?,
                Err(_) => return Err(DubError::Timeout { tool, after: timeout }),
            },
        };

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        })
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}
