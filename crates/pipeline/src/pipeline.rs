//! Request orchestrator: chunked transfer, verification gate, analysis.

use std::path::Path;
use std::sync::Arc;

use seqcheck_analysis::{AnalysisJob, AnalysisRunner};
use seqcheck_transfer::{
    ChunkDispatcher, ChunkSink, Payload, TransferError, UploadCoordinator,
    calculate_file_checksum, copy_payload, validate_upload_name,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::error::PipelineError;
use crate::types::{PipelineConfig, PipelineEvent, PipelineState, Upload};
use crate::workspace::{RequestWorkspace, unique_filename};

/// Runs uploads through transfer, verification and analysis.
///
/// Analysis is only ever started after every chunk of the upload was
/// persisted and verified.
pub struct QcPipeline {
    config: PipelineConfig,
    runner: Arc<dyn AnalysisRunner>,
    dispatcher: ChunkDispatcher,
    coordinator: UploadCoordinator,
    events_tx: mpsc::Sender<PipelineEvent>,
    events_rx: Option<mpsc::Receiver<PipelineEvent>>,
    cancel: CancellationToken,
}

impl QcPipeline {
    /// Creates a pipeline that analyses verified uploads with `runner`.
    pub fn new(config: PipelineConfig, runner: Arc<dyn AnalysisRunner>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            dispatcher: ChunkDispatcher::new(config.chunk_size),
            coordinator: UploadCoordinator::new(config.worker_timeout),
            config,
            runner,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the default file sink used by chunk workers.
    pub fn with_chunk_sink(mut self, sink: Arc<dyn ChunkSink>) -> Self {
        self.dispatcher = ChunkDispatcher::with_sink(self.config.chunk_size, sink);
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.events_rx.take()
    }

    /// Returns the pipeline's cancellation token.
    ///
    /// Cancelling it stops every in-flight request and permanently shuts the
    /// pipeline down: later calls to [`run`](Self::run) end in
    /// [`PipelineError::Cancelled`] without dispatching anything.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one upload to a terminal state.
    ///
    /// On success the report directory is kept and the returned job locates
    /// the report. On every other outcome all files of the request are removed.
    pub async fn run(&self, upload: Upload) -> Result<AnalysisJob, PipelineError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("request", id = %request_id, file = %upload.file_name);

        let mut run = Run {
            request_id: request_id.clone(),
            state: PipelineState::Idle,
            events: &self.events_tx,
        };
        let result = self.execute(&mut run, upload).instrument(span).await;

        match &result {
            Ok(job) => {
                info!(request = %request_id, report = %job.report_path().display(), "analysis completed");
                run.emit(PipelineEvent::Completed {
                    request_id,
                    job: job.clone(),
                });
            }
            Err(e) => {
                error!(request = %request_id, state = ?run.state, error = %e, "request failed");
                run.emit(PipelineEvent::Failed {
                    request_id,
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn execute(&self, run: &mut Run<'_>, upload: Upload) -> Result<AnalysisJob, PipelineError> {
        if self.cancel.is_cancelled() {
            run.advance(PipelineState::Cancelled);
            return Err(PipelineError::Cancelled);
        }

        let (workspace, unique) = match self.receive(run, &upload).await {
            Ok(received) => received,
            Err(e) => {
                run.fail(&e, PipelineState::TransferFailed);
                return Err(e);
            }
        };
        run.advance(PipelineState::Verified);

        if self.cancel.is_cancelled() {
            run.advance(PipelineState::Cancelled);
            return Err(PipelineError::Cancelled);
        }

        self.analyse(run, workspace, unique).await
    }

    /// Validates, transfers and verifies the upload.
    ///
    /// Returns the workspace together with the working file name.
    async fn receive(
        &self,
        run: &mut Run<'_>,
        upload: &Upload,
    ) -> Result<(RequestWorkspace, String), PipelineError> {
        validate_upload_name(&upload.file_name)?;
        if upload.payload.is_empty() {
            return Err(TransferError::EmptyPayload.into());
        }

        let workspace = RequestWorkspace::create(
            &run.request_id,
            &self.config.work_root,
            &self.config.output_root,
        )?;

        run.advance(PipelineState::Dispatching);
        let dispatch = self.dispatcher.dispatch(&upload.payload, &workspace.chunk_dir());

        run.advance(PipelineState::AwaitingWorkers);
        let report = self.coordinator.await_verdict(dispatch, &self.cancel).await?;
        run.emit(PipelineEvent::TransferFinished {
            request_id: run.request_id.clone(),
            report: report.clone(),
        });
        if !report.verdict.is_success() {
            return Err(PipelineError::TransferVerificationFailed {
                expected: report.expected,
                failed: report.failed,
                missing: report.missing,
            });
        }

        let unique = unique_filename(&upload.file_name, &chrono::Local::now());
        persist_payload(&upload.payload, &workspace.input_path(&unique)).await?;
        Ok((workspace, unique))
    }

    async fn analyse(
        &self,
        run: &mut Run<'_>,
        mut workspace: RequestWorkspace,
        unique: String,
    ) -> Result<AnalysisJob, PipelineError> {
        run.advance(PipelineState::AnalysisRunning);

        let input = workspace.input_path(&unique);
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            res = self.runner.run(&input, workspace.output_dir()) => res.map_err(PipelineError::from),
        };
        if let Err(e) = outcome {
            run.fail(&e, PipelineState::AnalysisFailed);
            return Err(e);
        }

        let job = AnalysisJob::new(workspace.output_dir(), unique);
        if !job.report_path().exists() {
            warn!(report = %job.report_path().display(), "analysis tool did not write the expected report");
        }

        workspace.keep_output();
        run.advance(PipelineState::AnalysisSucceeded);
        Ok(job)
    }
}

/// Writes exactly the verified payload bytes to `dest` and checks the copy.
async fn persist_payload(payload: &Payload, dest: &Path) -> Result<(), PipelineError> {
    let payload = payload.clone();
    let dest_path = dest.to_path_buf();
    let (expected, actual) = tokio::task::spawn_blocking(move || {
        Ok::<_, TransferError>((
            copy_payload(&payload, &dest_path)?,
            calculate_file_checksum(&dest_path)?,
        ))
    })
    .await
    .map_err(std::io::Error::other)??;

    if expected != actual {
        return Err(TransferError::ChecksumMismatch.into());
    }
    tracing::debug!(path = %dest.display(), checksum = %actual, "working copy verified");
    Ok(())
}

/// State of one request while it runs.
struct Run<'a> {
    request_id: String,
    state: PipelineState,
    events: &'a mpsc::Sender<PipelineEvent>,
}

impl Run<'_> {
    fn advance(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            error!(from = ?self.state, to = ?next, "invalid pipeline transition");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "pipeline state changed");
        self.state = next;
        self.emit(PipelineEvent::StateChanged {
            request_id: self.request_id.clone(),
            state: next,
        });
    }

    /// Moves to the terminal state matching `err`.
    fn fail(&mut self, err: &PipelineError, otherwise: PipelineState) {
        let next = match err {
            PipelineError::Cancelled => PipelineState::Cancelled,
            _ => otherwise,
        };
        self.advance(next);
    }

    /// Events are dropped when nobody drains the channel.
    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.try_send(event);
    }
}
