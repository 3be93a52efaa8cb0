//! External QC analysis step and report retrieval.
//!
//! The analysis tool is an external collaborator: it receives a persisted
//! input file and an output directory, and writes an HTML report whose name
//! is derived from the input file name.

pub mod error;
pub mod invoker;
pub mod report;

pub use error::AnalysisError;
pub use invoker::{AnalysisRunner, DEFAULT_TOOL, FastQcInvoker};
pub use report::{
    AnalysisJob, REPORT_SUFFIX, download_link_html, read_report, report_file_name,
};
