// file: src/pipeline/orchestrator.rs
// description: drives splitter, worker pool, accumulator and throttler to a terminal export state
// reference: orchestrates the asynchronous decryption workflow

use crate::config::Config;
use crate::crypto::{FormSecretKey, SignatureVerifier};
use crate::error::{ExportError, Result};
use crate::exporter::{AttachmentThrottler, CsvAccumulator};
use crate::models::ClassifiedRecord;
use crate::pipeline::policy::{ExportResult, ExportState, TerminalState, Verdict};
use crate::pipeline::progress::{ProgressCallback, ProgressTracker};
use crate::stream::{LineSplitter, SubmissionSource};
use crate::utils::{ReferenceZone, Validator};
use crate::worker::{
    FetcherFactory, HttpAttachmentFetcher, LineData, SecretKeyProvider, WorkerContext, WorkerPool,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub form_id: String,
    pub title: String,
    pub download_attachments: bool,
    /// Origin for relative attachment urls.
    pub host_origin: String,
}

impl ExportRequest {
    pub fn csv_filename(&self) -> String {
        format!(
            "{}-{}.csv",
            Validator::sanitize_filename(&self.title),
            self.form_id
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub state: TerminalState,
    pub result: ExportResult,
    pub attachment_error_count: u64,
    pub attachments_saved: u64,
    pub csv_path: Option<PathBuf>,
}

enum Event {
    Cancelled,
    Settled(Result<ClassifiedRecord>),
    Line(Option<Result<String>>),
    Drained,
}

/// Mutable state owned by a single export run.
struct Run {
    pool: WorkerPool,
    lines: LineSplitter,
    accumulator: CsvAccumulator,
    throttler: AttachmentThrottler,
    state: ExportState,
}

impl Run {
    fn shutdown(&mut self) {
        self.pool.teardown();
        self.lines.abort();
    }
}

pub struct ExportOrchestrator {
    config: Config,
    fetcher_factory: FetcherFactory,
    on_progress: Option<ProgressCallback>,
    tracker: Option<Arc<ProgressTracker>>,
}

impl ExportOrchestrator {
    pub fn new(config: Config) -> Self {
        let fetcher_factory =
            HttpAttachmentFetcher::factory(Duration::from_secs(config.api.timeout_secs));
        Self {
            config,
            fetcher_factory,
            on_progress: None,
            tracker: None,
        }
    }

    pub fn with_fetcher_factory(mut self, factory: FetcherFactory) -> Self {
        self.fetcher_factory = factory;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Builds the shared worker state from the configured keys.
    pub fn worker_context(&self, keys: &dyn SecretKeyProvider) -> Result<Arc<WorkerContext>> {
        let secret_key = FormSecretKey::from_base64(&keys.secret_key()?)?;
        let verifier = SignatureVerifier::new(
            self.config.verification.public_key.as_deref(),
            self.config.verification.transaction_expiry_secs,
        )?;
        let zone = ReferenceZone::from_hours(self.config.export.timezone_offset_hours)?;
        Ok(WorkerContext::new(
            secret_key,
            verifier,
            zone,
            Arc::clone(&self.fetcher_factory),
        ))
    }

    pub async fn run(
        &self,
        request: &ExportRequest,
        source: SubmissionSource,
        keys: &dyn SecretKeyProvider,
        cancel: CancellationToken,
    ) -> Result<ExportSummary> {
        let expected = source.expected_count;
        if expected == 0 {
            info!("Form {} has no responses to export", request.form_id);
            return Ok(ExportSummary {
                state: TerminalState::Complete,
                result: ExportResult::default(),
                attachment_error_count: 0,
                attachments_saved: 0,
                csv_path: None,
            });
        }

        let ctx = self.worker_context(keys)?;
        let zone = ctx.zone;
        let worker_count =
            WorkerPool::worker_count(request.download_attachments, self.config.export.worker_count);

        let export = &self.config.export;
        let mut run = Run {
            pool: WorkerPool::spawn(worker_count, ctx, &cancel)?,
            lines: LineSplitter::new(source.bytes, cancel.child_token()),
            accumulator: CsvAccumulator::new(expected, export.metadata_rows, zone),
            throttler: AttachmentThrottler::new(
                &export.output_dir,
                export.attachment_convoy_size,
                Duration::from_millis(export.attachment_convoy_interval_ms),
            ),
            state: ExportState::new(expected),
        };
        let mut stream_done = false;

        info!(
            "Exporting {} responses of form {} with {} workers",
            expected, request.form_id, worker_count
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => Event::Cancelled,
                Some(settled) = run.pool.next_settled(), if run.pool.has_in_flight() => Event::Settled(settled),
                line = run.lines.next_line(), if !stream_done && run.pool.has_idle() => Event::Line(line),
                else => Event::Drained,
            };

            match event {
                Event::Cancelled => {
                    run.shutdown();
                    warn!("Export of form {} cancelled", request.form_id);
                    return Err(ExportError::Cancelled);
                }
                Event::Settled(Ok(record)) => {
                    // attachment saves may sit in a convoy wait
                    let handled = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = self.handle_record(record, &mut run) => true,
                    };
                    if !handled {
                        run.shutdown();
                        warn!("Export of form {} cancelled", request.form_id);
                        return Err(ExportError::Cancelled);
                    }
                    self.notify(&mut run.state);
                }
                Event::Settled(Err(e)) => {
                    warn!("Decryption task rejected: {}", e);
                    run.state.record_error();
                    self.notify(&mut run.state);
                }
                Event::Line(Some(Ok(line))) => {
                    let data = LineData {
                        line,
                        form_id: request.form_id.clone(),
                        download_attachments: request.download_attachments,
                        host_origin: request.host_origin.clone(),
                    };
                    if let Err(e) = run.pool.dispatch(data) {
                        warn!("Could not dispatch submission line: {}", e);
                        run.state.record_error();
                        self.notify(&mut run.state);
                    }
                }
                Event::Line(Some(Err(e))) => {
                    run.shutdown();
                    error!("Submission stream failed: {}", e);
                    return Err(e);
                }
                Event::Line(None) => {
                    debug!("Submission stream ended");
                    stream_done = true;
                }
                Event::Drained => {}
            }

            match run.state.evaluate() {
                Verdict::TotalFailure => {
                    run.shutdown();
                    let result = run.state.result();
                    error!(
                        "No responses could be exported: {} errors, {} unverified",
                        result.error_count, result.unverified_count
                    );
                    return Err(ExportError::AllRecordsFailed { result });
                }
                Verdict::Complete => {
                    return self.finish(TerminalState::Complete, request, &mut run).await;
                }
                Verdict::Pending if stream_done && !run.pool.has_in_flight() => {
                    if cancel.is_cancelled() {
                        run.shutdown();
                        return Err(ExportError::Cancelled);
                    }
                    warn!(
                        "Stream ended after {} of {} responses",
                        run.state.processed(),
                        expected
                    );
                    return self.finish(TerminalState::PartialFailure, request, &mut run).await;
                }
                Verdict::Pending => {}
            }
        }
    }

    async fn handle_record(&self, mut record: ClassifiedRecord, run: &mut Run) {
        let attachment = record.take_attachment();
        let submission_id = record.submission_id.clone();

        if record.is_ok() {
            match run.accumulator.add_record(record.submission_data) {
                Ok(()) => run.state.record_success(run.accumulator.len() as u64),
                Err(e) => {
                    warn!("Submission {} could not be added: {}", submission_id, e);
                    run.state.record_error();
                }
            }
        } else {
            run.state.record_failure(&record.outcome);
        }

        if let Some(archive) = attachment {
            let filename = format!("RefNo {}.zip", submission_id);
            if let Err(e) = run.throttler.save(&filename, &archive).await {
                warn!("Could not save attachments for {}: {}", submission_id, e);
            }
        }
    }

    fn notify(&self, state: &mut ExportState) {
        let processed = state.advance();
        if let Some(callback) = &self.on_progress {
            callback(processed);
        }
        if let Some(tracker) = &self.tracker {
            tracker.update(state);
        }
    }

    async fn finish(
        &self,
        terminal: TerminalState,
        request: &ExportRequest,
        run: &mut Run,
    ) -> Result<ExportSummary> {
        run.shutdown();
        let result = run.state.result();

        if result.success_count == 0 {
            error!("Stream ended without any exportable response");
            return Err(ExportError::AllRecordsFailed { result });
        }

        run.accumulator
            .add_metadata_from_submission(result.error_count, result.unverified_count)?;
        let csv_path = run
            .accumulator
            .download_csv(&self.config.export.output_dir, &request.csv_filename())
            .await?;

        Ok(ExportSummary {
            state: terminal,
            result,
            attachment_error_count: run.state.attachment_error,
            attachments_saved: run.throttler.total_saved(),
            csv_path: Some(csv_path),
        })
    }
}
