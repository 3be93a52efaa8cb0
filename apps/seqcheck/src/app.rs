//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use seqcheck_analysis::{AnalysisJob, download_link_html, read_report};
use seqcheck_pipeline::{PipelineEvent, QcPipeline, Upload};
use seqcheck_transfer::Payload;

use crate::config::Config;

const LINK_LABEL: &str = "FastQC Report";

/// Runs one file through the pipeline and reports where its report is.
pub async fn analyze(
    config: Config,
    file: &Path,
    link: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", file.display()))?
        .to_string();
    let payload = Payload::from_file(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    tracing::info!(file = %file_name, bytes = payload.len(), "file received");

    let mut pipeline = QcPipeline::new(config.pipeline(), Arc::new(config.invoker()));
    if let Some(mut events) = pipeline.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let job = pipeline.run(Upload::new(file_name, payload)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!("{}", job.report_path().display());
    }

    if let Some(dest) = link {
        write_link(&job, dest).await?;
    }
    Ok(())
}

/// Retrieves the report of an earlier run.
pub async fn report(
    output_dir: PathBuf,
    unique_filename: String,
    link: Option<&Path>,
) -> anyhow::Result<()> {
    let job = AnalysisJob::new(output_dir, unique_filename);
    match link {
        Some(dest) => write_link(&job, dest).await,
        None => {
            let bytes = read_report(&job).await?;
            tracing::info!(bytes = bytes.len(), "report available");
            println!("{}", job.report_path().display());
            Ok(())
        }
    }
}

async fn write_link(job: &AnalysisJob, dest: &Path) -> anyhow::Result<()> {
    let bytes = read_report(job).await?;
    let html = download_link_html(&bytes, &job.report_file_name(), LINK_LABEL);
    tokio::fs::write(dest, html)
        .await
        .with_context(|| format!("cannot write {}", dest.display()))?;
    tracing::info!(path = %dest.display(), "download link written");
    Ok(())
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StateChanged { request_id, state } => {
            tracing::info!(request = %request_id, state = ?state, "pipeline state");
        }
        PipelineEvent::TransferFinished { request_id, report } => {
            tracing::info!(
                request = %request_id,
                chunks = report.expected,
                succeeded = report.succeeded,
                "transfer finished"
            );
        }
        PipelineEvent::Completed { .. } | PipelineEvent::Failed { .. } => {}
    }
}
