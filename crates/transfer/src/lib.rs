//! Chunked transfer of an uploaded payload with per-chunk verification.
//!
//! A payload is split into fixed-size ranges, each range is persisted by its
//! own worker, and the coordinator reduces the per-chunk outcomes into a
//! single [`TransferVerdict`].

mod chunked;
mod coordinator;
mod dispatch;
mod types;
mod validation;

pub use chunked::{
    ChunkSink, FileChunkSink, calculate_file_checksum, calculate_payload_checksum,
    checksum_bytes, copy_payload, plan_chunks, transfer_chunk,
};
pub use coordinator::{DEFAULT_WORKER_TIMEOUT, UploadCoordinator};
pub use dispatch::{ChunkDispatcher, Dispatch};
pub use types::{ChunkRange, Payload, TransferReport, TransferVerdict, WorkerOutcome};
pub use validation::{ACCEPTED_EXTENSIONS, validate_upload_name};

/// Default chunk size: 200 MiB.
///
/// Matches the upload size cap, so a typical upload is a single chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 200 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("range {start}+{len} exceeds payload length {payload_len}")]
    OutOfBounds {
        start: u64,
        len: usize,
        payload_len: u64,
    },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("unsupported file format: {0} (expected .fastq or .fq)")]
    UnsupportedFormat(String),

    #[error("payload truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("empty upload")]
    EmptyPayload,

    #[error("cancelled")]
    Cancelled,
}
