use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::TransferError;

/// The full uploaded content of one request.
///
/// Cloning is cheap: in-memory bytes are reference counted and file-backed
/// payloads only carry their path. Each worker reads its own range through
/// [`Payload::read_range`], so there is no shared read cursor.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes already held in memory (e.g. a browser upload buffer).
    Memory(Arc<[u8]>),
    /// A file on disk with a length captured at construction.
    File { path: PathBuf, len: u64 },
}

impl Payload {
    /// Wraps an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Payload::Memory(bytes.into())
    }

    /// Wraps a file, capturing its current length.
    pub fn from_file(path: &Path) -> Result<Self, TransferError> {
        let len = std::fs::metadata(path)?.len();
        Ok(Payload::File {
            path: path.to_path_buf(),
            len,
        })
    }

    /// Total payload length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Payload::Memory(bytes) => bytes.len() as u64,
            Payload::File { len, .. } => *len,
        }
    }

    /// Returns `true` if the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly the bytes covered by `range`.
    ///
    /// File-backed payloads open a fresh handle and seek to `range.start`.
    pub fn read_range(&self, range: &ChunkRange) -> Result<Vec<u8>, TransferError> {
        if range.end() > self.len() {
            return Err(TransferError::OutOfBounds {
                start: range.start,
                len: range.len,
                payload_len: self.len(),
            });
        }
        match self {
            Payload::Memory(bytes) => {
                let start = range.start as usize;
                Ok(bytes[start..start + range.len].to_vec())
            }
            Payload::File { path, .. } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(range.start))?;
                let mut buf = vec![0u8; range.len];
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// A half-open byte range `[start, start + len)` within a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    /// Byte offset of the first byte.
    pub start: u64,
    /// Number of bytes in this chunk.
    pub len: usize,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    /// File name of the persisted artifact for this chunk.
    pub fn artifact_name(&self) -> String {
        format!("chunk_{:012}.part", self.start)
    }
}

/// Outcome reported by exactly one worker for its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub start: u64,
    pub succeeded: bool,
}

/// Aggregated pass/fail result of all workers of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVerdict {
    AllSucceeded,
    Failed,
}

impl TransferVerdict {
    /// Reduces outcomes with a logical AND.
    ///
    /// Arrival order is irrelevant. Fewer outcomes than `expected` is a failure.
    pub fn reduce(expected: usize, outcomes: &[WorkerOutcome]) -> Self {
        if outcomes.len() >= expected && outcomes.iter().all(|o| o.succeeded) {
            TransferVerdict::AllSucceeded
        } else {
            TransferVerdict::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == TransferVerdict::AllSucceeded
    }
}

/// Summary of one chunked transfer, produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Number of chunks dispatched.
    pub expected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Outcomes that never arrived (panicked or abandoned workers).
    pub missing: usize,
    /// Workers still running when the deadline passed.
    pub timed_out: usize,
    pub verdict: TransferVerdict,
}

impl TransferReport {
    /// Builds a report from the drained outcomes.
    pub fn from_outcomes(expected: usize, outcomes: &[WorkerOutcome], timed_out: usize) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let failed = outcomes.len() - succeeded;
        Self {
            expected,
            succeeded,
            failed,
            missing: expected.saturating_sub(outcomes.len()),
            timed_out,
            verdict: TransferVerdict::reduce(expected, outcomes),
        }
    }
}
