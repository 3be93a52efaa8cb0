//! Data types for the pipeline flow.

use std::path::PathBuf;
use std::time::Duration;

use seqcheck_analysis::AnalysisJob;
use seqcheck_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKER_TIMEOUT, Payload, TransferReport};

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-declared file name, e.g. `sample.fastq`.
    pub file_name: String,
    pub payload: Payload,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, payload: Payload) -> Self {
        Self {
            file_name: file_name.into(),
            payload,
        }
    }
}

/// Pipeline settings shared by all requests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum bytes per chunk (0 = default).
    pub chunk_size: usize,
    /// Parent of the per-request scratch directories.
    pub work_root: PathBuf,
    /// Parent of the per-request report directories.
    pub output_root: PathBuf,
    /// Deadline for all chunk workers of one request.
    pub worker_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            work_root: std::env::temp_dir().join("seqcheck"),
            output_root: PathBuf::from("fastqc_output"),
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }
}

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Dispatching,
    AwaitingWorkers,
    Verified,
    TransferFailed,
    AnalysisRunning,
    AnalysisSucceeded,
    AnalysisFailed,
    Cancelled,
}

impl PipelineState {
    /// Returns `true` for states that end a request.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::TransferFailed
                | PipelineState::AnalysisSucceeded
                | PipelineState::AnalysisFailed
                | PipelineState::Cancelled
        )
    }

    /// Whether `next` may directly follow `self`.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Dispatching | TransferFailed | Cancelled)
                | (Dispatching, AwaitingWorkers)
                | (AwaitingWorkers, Verified | TransferFailed | Cancelled)
                | (Verified, AnalysisRunning | Cancelled)
                | (AnalysisRunning, AnalysisSucceeded | AnalysisFailed | Cancelled)
        )
    }
}

/// Progress event emitted while a request runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The request moved to a new state.
    StateChanged {
        request_id: String,
        state: PipelineState,
    },
    /// All chunk outcomes were collected.
    TransferFinished {
        request_id: String,
        report: TransferReport,
    },
    /// The analysis finished and its report can be retrieved.
    Completed {
        request_id: String,
        job: AnalysisJob,
    },
    /// The request ended with an error.
    Failed { request_id: String, error: String },
}
