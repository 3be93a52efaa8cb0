//! Report naming and retrieval.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Suffix the QC tool appends to the input stem for its HTML report.
pub const REPORT_SUFFIX: &str = "_fastqc.html";

/// A finished analysis whose report can be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Directory the tool wrote its artifacts into.
    pub output_dir: PathBuf,
    /// Working file name the tool was run on (`<timestamp>_<original>`).
    pub unique_filename: String,
}

impl AnalysisJob {
    pub fn new(output_dir: impl Into<PathBuf>, unique_filename: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            unique_filename: unique_filename.into(),
        }
    }

    /// File name of the HTML report.
    pub fn report_file_name(&self) -> String {
        report_file_name(&self.unique_filename)
    }

    /// Full path of the HTML report.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(self.report_file_name())
    }
}

/// Derives the report name: final extension stripped, `_fastqc.html` appended.
pub fn report_file_name(unique_filename: &str) -> String {
    let stem = Path::new(unique_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(unique_filename);
    format!("{stem}{REPORT_SUFFIX}")
}

/// Reads the job's report.
///
/// Returns [`AnalysisError::ReportNotFound`] if the tool did not produce a
/// file under the derived name.
pub async fn read_report(job: &AnalysisJob) -> Result<Vec<u8>, AnalysisError> {
    let path = job.report_path();
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "report read");
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "report missing");
            Err(AnalysisError::ReportNotFound(path))
        }
        Err(e) => Err(e.into()),
    }
}

/// Builds an inline download anchor carrying `data` as base64.
pub fn download_link_html(data: &[u8], file_name: &str, label: &str) -> String {
    let b64 = STANDARD.encode(data);
    format!(
        r#"<a href="data:application/octet-stream;base64,{b64}" download="{}">Download {}</a>"#,
        escape_html(file_name),
        escape_html(label)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
