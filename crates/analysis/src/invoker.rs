//! Invocation of the external QC tool.
//!
//! The tool is reached only through its command-line contract:
//! `<tool> [extra args] <input> -o <output_dir>`, zero exit on success.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use crate::error::AnalysisError;

/// Default analysis tool executable.
pub const DEFAULT_TOOL: &str = "fastqc";

/// Runs an analysis over a persisted input file.
///
/// `QcPipeline` depends on this trait rather than on a concrete process
/// launcher, so tests can observe whether analysis was attempted.
pub trait AnalysisRunner: Send + Sync {
    /// Analyses `input`, writing the tool's artifacts into `output_dir`.
    fn run<'a>(
        &'a self,
        input: &'a Path,
        output_dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'a>>;
}

/// Runs FastQC (or a compatible tool) as a child process.
#[derive(Debug, Clone)]
pub struct FastQcInvoker {
    tool: PathBuf,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for FastQcInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

impl FastQcInvoker {
    /// Creates an invoker for `tool`, resolved through `PATH` if not absolute.
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            extra_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before the input path (e.g. `--threads 4`).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Kills the tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn command_line(&self, input: &Path, output_dir: &Path) -> String {
        let mut parts = vec![self.tool.display().to_string()];
        parts.extend(self.extra_args.iter().cloned());
        parts.push(input.display().to_string());
        parts.push("-o".into());
        parts.push(output_dir.display().to_string());
        parts.join(" ")
    }

    async fn execute(&self, input: &Path, output_dir: &Path) -> Result<(), AnalysisError> {
        let mut cmd = tokio::process::Command::new(&self.tool);
        cmd.args(&self.extra_args)
            .arg(input)
            .arg("-o")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(command = %self.command_line(input, output_dir), "running analysis tool");

        let launched = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| AnalysisError::TimedOut(limit))?,
            None => cmd.output().await,
        };
        let output = launched.map_err(|source| AnalysisError::Launch {
            tool: self.tool.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(code = ?output.status.code(), stderr = %stderr, "analysis tool failed");
            return Err(AnalysisError::ToolFailed {
                code: output.status.code(),
                stderr,
            });
        }

        tracing::debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "analysis tool finished"
        );
        Ok(())
    }
}

impl AnalysisRunner for FastQcInvoker {
    fn run<'a>(
        &'a self,
        input: &'a Path,
        output_dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'a>> {
        Box::pin(self.execute(input, output_dir))
    }
}
