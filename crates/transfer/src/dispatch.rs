//! Fan-out of one worker per chunk.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chunked::{ChunkSink, FileChunkSink, plan_chunks, run_worker};
use crate::types::{ChunkRange, Payload, WorkerOutcome};

/// Handles of a started batch of workers, consumed by the coordinator.
pub struct Dispatch {
    pub(crate) ranges: Vec<ChunkRange>,
    pub(crate) handles: Vec<JoinHandle<()>>,
    pub(crate) results: mpsc::UnboundedReceiver<WorkerOutcome>,
}

impl Dispatch {
    /// Ranges that were dispatched, in payload order.
    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    /// Number of workers started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Partitions a payload and starts one concurrent worker per range.
pub struct ChunkDispatcher {
    chunk_size: usize,
    sink: Arc<dyn ChunkSink>,
}

impl ChunkDispatcher {
    /// Creates a dispatcher persisting chunks with [`FileChunkSink`].
    ///
    /// A `chunk_size` of 0 selects [`DEFAULT_CHUNK_SIZE`](crate::DEFAULT_CHUNK_SIZE).
    pub fn new(chunk_size: usize) -> Self {
        Self::with_sink(chunk_size, Arc::new(FileChunkSink))
    }

    /// Creates a dispatcher with a custom chunk sink.
    pub fn with_sink(chunk_size: usize, sink: Arc<dyn ChunkSink>) -> Self {
        Self { chunk_size, sink }
    }

    /// Starts all workers and returns without waiting for any of them.
    ///
    /// Workers run on the blocking pool, so this must be called from within a
    /// tokio runtime. Artifacts are written into `dir`, which must exist.
    pub fn dispatch(&self, payload: &Payload, dir: &Path) -> Dispatch {
        let ranges = plan_chunks(payload.len(), self.chunk_size);
        let (tx, rx) = mpsc::unbounded_channel();

        let handles = ranges
            .iter()
            .map(|range| {
                let payload = payload.clone();
                let range = *range;
                let dir = dir.to_path_buf();
                let sink = Arc::clone(&self.sink);
                let tx = tx.clone();
                tokio::task::spawn_blocking(move || {
                    run_worker(payload, range, dir, sink.as_ref(), tx);
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            chunks = ranges.len(),
            chunk_size = self.chunk_size,
            payload_len = payload.len(),
            "chunk workers dispatched"
        );

        Dispatch {
            ranges,
            handles,
            results: rx,
        }
    }
}
