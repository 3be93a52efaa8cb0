//! Synchronization barrier over a dispatched batch of chunk workers.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::TransferError;
use crate::dispatch::Dispatch;
use crate::types::{TransferReport, WorkerOutcome};

/// Default time allowed for all workers of one upload to finish.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Waits for every worker of a batch and reduces their outcomes to a verdict.
#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    timeout: Duration,
}

impl Default for UploadCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_TIMEOUT)
    }
}

impl UploadCoordinator {
    /// Creates a coordinator whose barrier expires `timeout` after it starts.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Blocks until all workers terminate or the deadline passes, then drains
    /// the results channel.
    ///
    /// Workers still running at the deadline are abandoned and count as
    /// failures. Cancellation aborts the wait with [`TransferError::Cancelled`].
    pub async fn await_verdict(
        &self,
        dispatch: Dispatch,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let Dispatch {
            ranges,
            handles,
            mut results,
        } = dispatch;
        let expected = ranges.len();
        let deadline = Instant::now() + self.timeout;
        let mut timed_out = HashSet::new();

        let mut pending = ranges.iter().zip(handles);
        while let Some((range, mut handle)) = pending.next() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    handle.abort();
                    for (_, rest) in pending.by_ref() {
                        rest.abort();
                    }
                    tracing::info!(chunks = expected, "chunk transfer cancelled");
                    return Err(TransferError::Cancelled);
                }
                joined = tokio::time::timeout_at(deadline, &mut handle) => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(start = range.start, error = %e, "chunk worker terminated abnormally");
                    }
                    Err(_) => {
                        tracing::warn!(start = range.start, "chunk worker timed out");
                        handle.abort();
                        timed_out.insert(range.start);
                    }
                }
            }
        }

        let mut outcomes: Vec<WorkerOutcome> = Vec::with_capacity(expected);
        while let Ok(outcome) = results.try_recv() {
            // A late report from an abandoned worker does not count.
            if !timed_out.contains(&outcome.start) {
                outcomes.push(outcome);
            }
        }
        outcomes.extend(timed_out.iter().map(|&start| WorkerOutcome {
            start,
            succeeded: false,
        }));

        let report = TransferReport::from_outcomes(expected, &outcomes, timed_out.len());
        tracing::info!(
            expected = report.expected,
            succeeded = report.succeeded,
            failed = report.failed,
            missing = report.missing,
            timed_out = report.timed_out,
            verdict = ?report.verdict,
            "chunk transfer finished"
        );
        Ok(report)
    }
}
