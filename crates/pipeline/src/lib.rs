//! Upload-verify-analyse pipeline for sequencing-read files.
//!
//! # Pipeline
//!
//! 1. **Intake**: validate the file name and reject empty uploads
//! 2. **Transfer**: split the payload into chunks, persist each on its own worker
//! 3. **Verify**: reduce chunk outcomes to a verdict, persist the whole file
//! 4. **Analyse**: run the QC tool on the verified file (skipped on any failure)
//! 5. **Retrieve**: the caller reads the report through the returned job
//!
//! Each request works in its own scratch and output directories; scratch
//! files are removed on every exit path.

pub mod error;
pub mod pipeline;
pub mod types;
pub mod workspace;

pub use error::PipelineError;
pub use pipeline::QcPipeline;
pub use types::{PipelineConfig, PipelineEvent, PipelineState, Upload};
pub use workspace::{RequestWorkspace, unique_filename};
