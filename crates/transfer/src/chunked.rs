use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{ChunkRange, Payload, WorkerOutcome};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Computes SHA-256 of a whole payload, reading file-backed payloads in blocks.
///
/// Only the `len` bytes captured when the payload was created are hashed.
pub fn calculate_payload_checksum(payload: &Payload) -> Result<String, TransferError> {
    match payload {
        Payload::Memory(bytes) => Ok(checksum_bytes(bytes)),
        Payload::File { path, len } => copy_file_prefix(path, *len, &mut std::io::sink()),
    }
}

/// Writes exactly the payload's bytes to `dest` and returns their SHA-256.
///
/// A source file that grew after the payload was captured contributes only
/// its first `len` bytes. One that shrank fails with [`TransferError::Truncated`].
pub fn copy_payload(payload: &Payload, dest: &Path) -> Result<String, TransferError> {
    let mut out = std::fs::File::create(dest)?;
    let checksum = match payload {
        Payload::Memory(bytes) => {
            out.write_all(bytes)?;
            checksum_bytes(bytes)
        }
        Payload::File { path, len } => copy_file_prefix(path, *len, &mut out)?,
    };
    out.sync_all()?;
    Ok(checksum)
}

/// Streams `[0, len)` of `path` into `out`, hashing along the way.
fn copy_file_prefix(path: &Path, len: u64, out: &mut impl Write) -> Result<String, TransferError> {
    let mut reader = std::fs::File::open(path)?.take(len);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n])?;
        copied += n as u64;
    }
    if copied != len {
        return Err(TransferError::Truncated {
            expected: len,
            actual: copied,
        });
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Chunk planning
// ---------------------------------------------------------------------------

/// Splits `[0, len)` into consecutive ranges of at most `chunk_size` bytes.
///
/// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used. The last range may be
/// shorter; an empty payload yields no ranges.
pub fn plan_chunks(len: u64, chunk_size: usize) -> Vec<ChunkRange> {
    let chunk_size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };

    let mut ranges = Vec::with_capacity(len.div_ceil(chunk_size as u64) as usize);
    let mut start = 0u64;
    while start < len {
        let remaining = len - start;
        let size = std::cmp::min(remaining, chunk_size as u64) as usize;
        ranges.push(ChunkRange { start, len: size });
        start += size as u64;
    }
    ranges
}

// ---------------------------------------------------------------------------
// ChunkSink
// ---------------------------------------------------------------------------

/// Destination for persisted chunk artifacts.
///
/// Called from worker threads, so implementations must be thread-safe.
pub trait ChunkSink: Send + Sync {
    /// Persists `data` for `range` under `dir` and returns the artifact path.
    fn persist(
        &self,
        dir: &Path,
        range: &ChunkRange,
        data: &[u8],
    ) -> Result<PathBuf, TransferError>;
}

/// Writes each chunk to its own file and verifies it by re-reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileChunkSink;

impl ChunkSink for FileChunkSink {
    fn persist(
        &self,
        dir: &Path,
        range: &ChunkRange,
        data: &[u8],
    ) -> Result<PathBuf, TransferError> {
        let path = dir.join(range.artifact_name());
        let expected = checksum_bytes(data);

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(data)?;
        file.sync_all()?;

        if calculate_file_checksum(&path)? != expected {
            return Err(TransferError::ChecksumMismatch);
        }
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// ChunkWorker
// ---------------------------------------------------------------------------

/// Reads one range from the payload and persists it through `sink`.
pub fn transfer_chunk(
    payload: &Payload,
    range: &ChunkRange,
    dir: &Path,
    sink: &dyn ChunkSink,
) -> Result<PathBuf, TransferError> {
    let data = payload.read_range(range)?;
    sink.persist(dir, range, &data)
}

/// Runs one worker to completion and reports a boolean outcome.
///
/// Errors never escape: they are logged and downgraded to a failed outcome.
pub(crate) fn run_worker(
    payload: Payload,
    range: ChunkRange,
    dir: PathBuf,
    sink: &dyn ChunkSink,
    results: UnboundedSender<WorkerOutcome>,
) {
    let succeeded = match transfer_chunk(&payload, &range, &dir, sink) {
        Ok(path) => {
            tracing::debug!(start = range.start, len = range.len, path = %path.display(), "chunk persisted");
            true
        }
        Err(e) => {
            tracing::warn!(start = range.start, len = range.len, error = %e, "chunk transfer failed");
            false
        }
    };

    // The coordinator may have stopped listening after its deadline.
    let _ = results.send(WorkerOutcome {
        start: range.start,
        succeeded,
    });
}
