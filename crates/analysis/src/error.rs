//! Analysis error types.

use std::path::PathBuf;
use std::time::Duration;

/// Errors produced while running the analysis tool or retrieving its report.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to start {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis tool {}: {stderr}", exit_label(.code))]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("analysis tool timed out after {0:?}")]
    TimedOut(Duration),

    #[error("report not found: {}", .0.display())]
    ReportNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".into(),
    }
}
