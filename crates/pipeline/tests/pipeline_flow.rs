use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seqcheck_analysis::{AnalysisError, AnalysisRunner, read_report, report_file_name};
use seqcheck_pipeline::{
    PipelineConfig, PipelineError, PipelineEvent, PipelineState, QcPipeline, Upload,
};
use seqcheck_transfer::{ChunkRange, ChunkSink, FileChunkSink, Payload, TransferError};
use tempfile::TempDir;

/// Records every analysis attempt and writes a small report.
#[derive(Default)]
struct SpyRunner {
    calls: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    started: tokio::sync::Notify,
    fail: bool,
    hang: bool,
    report_name: Option<String>,
}

impl SpyRunner {
    fn calls(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AnalysisRunner for SpyRunner {
    fn run<'a>(
        &'a self,
        input: &'a Path,
        output_dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let content = std::fs::read(input)?;
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), content.clone()));
            self.started.notify_one();

            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(AnalysisError::ToolFailed {
                    code: Some(1),
                    stderr: "Failed to process file".into(),
                });
            }

            let name = self.report_name.clone().unwrap_or_else(|| {
                report_file_name(&input.file_name().unwrap().to_string_lossy())
            });
            std::fs::write(
                output_dir.join(name),
                format!("<html>{} bytes</html>", content.len()),
            )?;
            Ok(())
        })
    }
}

/// Fails the chunk starting at the given offset.
struct FailAt(u64);

impl ChunkSink for FailAt {
    fn persist(
        &self,
        dir: &Path,
        range: &ChunkRange,
        data: &[u8],
    ) -> Result<PathBuf, TransferError> {
        if range.start == self.0 {
            return Err(std::io::Error::other("disk full").into());
        }
        FileChunkSink.persist(dir, range, data)
    }
}

/// Holds every worker for `delay` before persisting, announcing each start.
struct SlowSink {
    delay: Duration,
    entered: Arc<tokio::sync::Notify>,
}

impl SlowSink {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            entered: Arc::new(tokio::sync::Notify::new()),
        }
    }
}

impl ChunkSink for SlowSink {
    fn persist(
        &self,
        dir: &Path,
        range: &ChunkRange,
        data: &[u8],
    ) -> Result<PathBuf, TransferError> {
        self.entered.notify_one();
        std::thread::sleep(self.delay);
        FileChunkSink.persist(dir, range, data)
    }
}

struct Fixture {
    root: TempDir,
    config: PipelineConfig,
}

impl Fixture {
    fn new(chunk_size: usize) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            chunk_size,
            work_root: root.path().join("work"),
            output_root: root.path().join("out"),
            worker_timeout: Duration::from_secs(10),
        };
        Self { root, config }
    }

    fn entries(&self, dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    fn assert_no_leftovers(&self) {
        assert_eq!(self.entries(&self.config.work_root), 0, "scratch left behind");
        assert_eq!(self.entries(&self.config.output_root), 0, "output left behind");
    }
}

fn reads(len: usize) -> Vec<u8> {
    b"@r\nACGTNACGTN\n+\nIIIII#IIII\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

fn states(events: &[PipelineEvent]) -> Vec<PipelineState> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn all_chunks_succeed_then_analysis_sees_whole_payload() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let mut pipeline = QcPipeline::new(fx.config.clone(), spy.clone());
    let mut events_rx = pipeline.take_events().unwrap();

    let payload = reads(250);
    let job = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(payload.clone())))
        .await
        .unwrap();

    let calls = spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, payload);
    assert!(job.unique_filename.ends_with("_sample.fastq"));
    assert!(job.output_dir.starts_with(&fx.config.output_root));

    let report = read_report(&job).await.unwrap();
    assert_eq!(report, b"<html>250 bytes</html>");

    // Scratch is gone, the report directory stays.
    assert_eq!(fx.entries(&fx.config.work_root), 0);
    assert_eq!(fx.entries(&fx.config.output_root), 1);

    let events = drain(&mut events_rx);
    assert_eq!(
        states(&events),
        vec![
            PipelineState::Dispatching,
            PipelineState::AwaitingWorkers,
            PipelineState::Verified,
            PipelineState::AnalysisRunning,
            PipelineState::AnalysisSucceeded,
        ]
    );
    let transfer = events.iter().find_map(|e| match e {
        PipelineEvent::TransferFinished { report, .. } => Some(report.clone()),
        _ => None,
    });
    let transfer = transfer.unwrap();
    assert_eq!(transfer.expected, 3);
    assert_eq!(transfer.succeeded, 3);
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
}

#[tokio::test]
async fn middle_chunk_failure_skips_analysis() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let mut pipeline =
        QcPipeline::new(fx.config.clone(), spy.clone()).with_chunk_sink(Arc::new(FailAt(100)));
    let mut events_rx = pipeline.take_events().unwrap();

    let err = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(250))))
        .await
        .unwrap_err();

    match err {
        PipelineError::TransferVerificationFailed {
            expected,
            failed,
            missing,
        } => {
            assert_eq!(expected, 3);
            assert_eq!(failed, 1);
            assert_eq!(missing, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(spy.calls().is_empty());
    fx.assert_no_leftovers();

    let events = drain(&mut events_rx);
    assert_eq!(states(&events).last(), Some(&PipelineState::TransferFailed));
    assert!(!states(&events).contains(&PipelineState::AnalysisRunning));
    assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
}

#[tokio::test]
async fn tool_failure_returns_no_report() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner {
        fail: true,
        ..Default::default()
    });
    let pipeline = QcPipeline::new(fx.config.clone(), spy.clone());

    let err = pipeline
        .run(Upload::new("sample.fq", Payload::from_bytes(reads(120))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Analysis(AnalysisError::ToolFailed { code: Some(1), .. })
    ));
    assert_eq!(spy.calls().len(), 1);
    fx.assert_no_leftovers();
}

#[tokio::test]
async fn unsupported_extension_is_rejected_before_dispatch() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let mut pipeline = QcPipeline::new(fx.config.clone(), spy.clone());
    let mut events_rx = pipeline.take_events().unwrap();

    let err = pipeline
        .run(Upload::new("reads.bam", Payload::from_bytes(reads(10))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transfer(TransferError::UnsupportedFormat(_))
    ));
    assert!(spy.calls().is_empty());
    assert_eq!(
        states(&drain(&mut events_rx)),
        vec![PipelineState::TransferFailed]
    );
    fx.assert_no_leftovers();
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let pipeline = QcPipeline::new(fx.config.clone(), spy.clone());

    let err = pipeline
        .run(Upload::new("empty.fastq", Payload::from_bytes(Vec::<u8>::new())))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transfer(TransferError::EmptyPayload)
    ));
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn cancellation_during_analysis_cleans_up() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner {
        hang: true,
        ..Default::default()
    });
    let pipeline = QcPipeline::new(fx.config.clone(), spy.clone());

    let cancel = pipeline.cancel_token();
    let watcher = spy.clone();
    tokio::spawn(async move {
        watcher.started.notified().await;
        cancel.cancel();
    });

    let err = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(250))))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(spy.calls().len(), 1);
    fx.assert_no_leftovers();
}

#[tokio::test]
async fn misnamed_report_is_detected_at_retrieval() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner {
        report_name: Some("something_else.html".into()),
        ..Default::default()
    });
    let pipeline = QcPipeline::new(fx.config.clone(), spy);

    let job = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(50))))
        .await
        .unwrap();

    let err = read_report(&job).await.unwrap_err();
    assert!(matches!(err, AnalysisError::ReportNotFound(p) if p == job.report_path()));
}

#[tokio::test]
async fn file_backed_payload_with_many_chunks() {
    let fx = Fixture::new(64);
    let source = fx.root.path().join("upload.fastq");
    let bytes = reads(1000);
    std::fs::write(&source, &bytes).unwrap();

    let spy = Arc::new(SpyRunner::default());
    let mut pipeline = QcPipeline::new(fx.config.clone(), spy.clone());
    let mut events_rx = pipeline.take_events().unwrap();

    pipeline
        .run(Upload::new("upload.fastq", Payload::from_file(&source).unwrap()))
        .await
        .unwrap();

    assert_eq!(spy.calls()[0].1, bytes);
    let expected = drain(&mut events_rx).iter().find_map(|e| match e {
        PipelineEvent::TransferFinished { report, .. } => Some(report.expected),
        _ => None,
    });
    assert_eq!(expected, Some(16));
}

#[tokio::test]
async fn bytes_appended_after_capture_never_reach_analysis() {
    let fx = Fixture::new(64);
    let source = fx.root.path().join("growing.fastq");
    let bytes = reads(100);
    std::fs::write(&source, &bytes).unwrap();
    let payload = Payload::from_file(&source).unwrap();

    let mut file = std::fs::OpenOptions::new().append(true).open(&source).unwrap();
    std::io::Write::write_all(&mut file, b"@late\nNNNN\n+\n####\n").unwrap();

    let spy = Arc::new(SpyRunner::default());
    let pipeline = QcPipeline::new(fx.config.clone(), spy.clone());
    pipeline
        .run(Upload::new("growing.fastq", payload))
        .await
        .unwrap();

    let calls = spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, bytes);
}

#[tokio::test]
async fn worker_past_deadline_fails_transfer() {
    let mut fx = Fixture::new(100);
    fx.config.worker_timeout = Duration::from_millis(100);
    let spy = Arc::new(SpyRunner::default());
    let mut pipeline = QcPipeline::new(fx.config.clone(), spy.clone())
        .with_chunk_sink(Arc::new(SlowSink::new(Duration::from_secs(1))));
    let mut events_rx = pipeline.take_events().unwrap();

    let err = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(250))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::TransferVerificationFailed {
            expected: 3,
            failed: 3,
            missing: 0
        }
    ));
    assert!(spy.calls().is_empty());
    fx.assert_no_leftovers();

    let events = drain(&mut events_rx);
    let timed_out = events.iter().find_map(|e| match e {
        PipelineEvent::TransferFinished { report, .. } => Some(report.timed_out),
        _ => None,
    });
    assert_eq!(timed_out, Some(3));
    assert_eq!(states(&events).last(), Some(&PipelineState::TransferFailed));
}

#[tokio::test]
async fn cancellation_during_transfer_cleans_up() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let sink = SlowSink::new(Duration::from_secs(1));
    let entered = sink.entered.clone();
    let mut pipeline =
        QcPipeline::new(fx.config.clone(), spy.clone()).with_chunk_sink(Arc::new(sink));
    let mut events_rx = pipeline.take_events().unwrap();

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        entered.notified().await;
        cancel.cancel();
    });

    let err = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(250))))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(spy.calls().is_empty());
    fx.assert_no_leftovers();
    assert_eq!(
        states(&drain(&mut events_rx)),
        vec![
            PipelineState::Dispatching,
            PipelineState::AwaitingWorkers,
            PipelineState::Cancelled,
        ]
    );
}

#[tokio::test]
async fn cancelled_pipeline_rejects_later_runs() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let mut pipeline = QcPipeline::new(fx.config.clone(), spy.clone());
    let mut events_rx = pipeline.take_events().unwrap();
    pipeline.cancel_token().cancel();

    let err = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(reads(250))))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(spy.calls().is_empty());
    fx.assert_no_leftovers();
    assert_eq!(
        states(&drain(&mut events_rx)),
        vec![PipelineState::Cancelled]
    );
}

#[tokio::test]
async fn concurrent_requests_use_separate_directories() {
    let fx = Fixture::new(100);
    let spy = Arc::new(SpyRunner::default());
    let pipeline = QcPipeline::new(fx.config.clone(), spy.clone());

    let (a, b) = tokio::join!(
        pipeline.run(Upload::new("same.fastq", Payload::from_bytes(reads(150)))),
        pipeline.run(Upload::new("same.fastq", Payload::from_bytes(reads(300)))),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.output_dir, b.output_dir);
    assert_eq!(read_report(&a).await.unwrap(), b"<html>150 bytes</html>");
    assert_eq!(read_report(&b).await.unwrap(), b"<html>300 bytes</html>");
}

#[cfg(unix)]
#[tokio::test]
async fn end_to_end_with_external_tool() {
    use seqcheck_analysis::FastQcInvoker;

    let fx = Fixture::new(100);
    let script = fx.root.path().join("fake_fastqc.sh");
    std::fs::write(
        &script,
        r#"in="$1"; out="$3"; base=$(basename "$in"); cp "$in" "$out/${base%.*}_fastqc.html""#,
    )
    .unwrap();
    let invoker = FastQcInvoker::new("sh").with_args(vec![script.display().to_string()]);
    let pipeline = QcPipeline::new(fx.config.clone(), Arc::new(invoker));

    let payload = reads(250);
    let job = pipeline
        .run(Upload::new("sample.fastq", Payload::from_bytes(payload.clone())))
        .await
        .unwrap();

    assert_eq!(read_report(&job).await.unwrap(), payload);
}
