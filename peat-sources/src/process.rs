//! Subprocess execution shared by the probe adapters.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use peat_core::error::{PeatError, Result};

/// Configuration of the subprocess probes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Python interpreter
    pub python_bin: String,
    /// Path to the holehe runner script
    pub holehe_script: PathBuf,
    /// Working directory for sherlock, if it is not installed globally
    pub sherlock_dir: Option<PathBuf>,
    /// Holehe timeout in seconds
    pub holehe_timeout_seconds: u64,
    /// Sherlock timeout in seconds
    pub sherlock_timeout_seconds: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".into(),
            holehe_script: PathBuf::from("scripts/holehe_runner.py"),
            sherlock_dir: None,
            holehe_timeout_seconds: 150,
            sherlock_timeout_seconds: 180,
        }
    }
}

impl ProbeConfig {
    /// Sets the Python interpreter.
    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    /// Sets the holehe runner script.
    pub fn with_holehe_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.holehe_script = path.into();
        self
    }

    /// Sets the sherlock working directory.
    pub fn with_sherlock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sherlock_dir = Some(dir.into());
        self
    }
}

/// Runs a command to completion under a timeout.
///
/// The child is killed if the timeout fires or the returned future is dropped.
pub(crate) async fn run_command(probe: &str, mut command: Command, timeout: Duration) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| PeatError::ProbeFailed {
        probe: probe.to_string(),
        reason: format!("failed to spawn: {}", e),
    })?;
    debug!(probe, pid = ?child.id(), "probe started");

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(PeatError::ProbeFailed {
            probe: probe.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(PeatError::SourceTimeout {
            source_name: probe.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Trimmed, lossy UTF-8 text of a captured stream.
pub(crate) fn stream_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
