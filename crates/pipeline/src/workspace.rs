//! Per-request directories.
//!
//! Scratch files (the working copy of the upload and its chunk artifacts)
//! live in a temporary directory removed when the workspace is dropped. The
//! report directory survives only if [`RequestWorkspace::keep_output`] was
//! called.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tempfile::TempDir;

const CHUNK_DIR: &str = "chunks";

/// Builds the working file name `<YYYYmmdd_HHMMSS>_<original>`.
pub fn unique_filename<Tz: TimeZone>(original: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{original}", at.format("%Y%m%d_%H%M%S"))
}

/// Directories owned by one request.
pub struct RequestWorkspace {
    scratch: TempDir,
    output_dir: PathBuf,
    keep_output: bool,
}

impl RequestWorkspace {
    /// Creates `<work_root>/<request_id>-XXXX/chunks` and `<output_root>/<request_id>`.
    pub fn create(
        request_id: &str,
        work_root: &Path,
        output_root: &Path,
    ) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(work_root)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{request_id}-"))
            .tempdir_in(work_root)?;
        std::fs::create_dir(scratch.path().join(CHUNK_DIR))?;

        let output_dir = output_root.join(request_id);
        std::fs::create_dir_all(&output_dir)?;

        tracing::debug!(
            scratch = %scratch.path().display(),
            output = %output_dir.display(),
            "request workspace created"
        );

        Ok(Self {
            scratch,
            output_dir,
            keep_output: false,
        })
    }

    /// Directory receiving chunk artifacts.
    pub fn chunk_dir(&self) -> PathBuf {
        self.scratch.path().join(CHUNK_DIR)
    }

    /// Path of the whole working copy of the upload.
    pub fn input_path(&self, unique_filename: &str) -> PathBuf {
        self.scratch.path().join(unique_filename)
    }

    /// Directory the analysis tool writes into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Keeps the report directory after the workspace is dropped.
    pub fn keep_output(&mut self) {
        self.keep_output = true;
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if !self.keep_output {
            if let Err(e) = std::fs::remove_dir_all(&self.output_dir) {
                tracing::warn!(path = %self.output_dir.display(), error = %e, "failed to remove output directory");
            }
        }
    }
}
