//! Pipeline error types.

use seqcheck_analysis::AnalysisError;
use seqcheck_transfer::TransferError;

/// Errors that end a pipeline run. Every variant is terminal for its request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("upload rejected: {0}")]
    Transfer(TransferError),

    #[error(
        "transfer verification failed: {failed} of {expected} chunks failed, {missing} missing"
    )]
    TransferVerificationFailed {
        expected: usize,
        failed: usize,
        missing: usize,
    },

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransferError> for PipelineError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Transfer(other),
        }
    }
}
