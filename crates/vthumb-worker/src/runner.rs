//! One selection run under a deadline.
//!
//! Extraction and the selection pipeline are synchronous and run on the
//! blocking pool under the deadline. The batch is persisted only once that
//! work finished in time; on timeout the partial result is discarded and
//! nothing is written.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn, Span};

use vthumb_models::ThumbnailRecord;
use vthumb_select::{RunStats, SelectionRequest, ThumbnailPipeline};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::extractor::FeatureExtractor;
use crate::sink::{ThumbnailBatch, ThumbnailSink};

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub sidecar_path: PathBuf,
    pub selected: usize,
    pub variant: Option<String>,
    pub stats: RunStats,
}

/// Records, assigned variant and counters of a finished selection.
type Selection = (Vec<ThumbnailRecord>, Option<String>, RunStats);

/// Wall-clock time spent in each stage of a run.
#[derive(Debug, Clone, Copy, Default)]
struct StageTimings {
    extract: Duration,
    select: Duration,
}

/// Runs the selection pipeline for one piece of content.
pub struct SelectionRunner {
    config: WorkerConfig,
    pipeline: ThumbnailPipeline,
    extractor: Arc<dyn FeatureExtractor>,
    sink: Arc<dyn ThumbnailSink>,
}

impl SelectionRunner {
    /// Build a runner, loading the pipeline configuration it names.
    pub fn new(
        config: WorkerConfig,
        extractor: Arc<dyn FeatureExtractor>,
        sink: Arc<dyn ThumbnailSink>,
    ) -> WorkerResult<Self> {
        let pipeline = ThumbnailPipeline::new(config.load_pipeline_config()?)?;
        Ok(Self {
            config,
            pipeline,
            extractor,
            sink,
        })
    }

    /// Request for this run. An unusable user profile degrades to an
    /// anonymous request.
    fn request(&self) -> SelectionRequest {
        let mut request = SelectionRequest::new(self.config.thumbnail_count)
            .with_genres(self.config.content.genres.iter().cloned());
        match self.config.load_user_profile() {
            Ok(Some(user)) => request = request.with_user(user),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "User profile unusable, selecting without personalization"),
        }
        if let Some(seed) = self.config.experiment_seed {
            request = request.with_seed(seed);
        }
        request
    }

    /// Execute one run with the configured deadline.
    #[instrument(
        name = "selection_run",
        skip(self),
        fields(content_id = %self.config.content.content_id)
    )]
    pub async fn run(&self, run_id: &str) -> WorkerResult<RunReport> {
        let started = Instant::now();
        let deadline = self.config.run_timeout;
        info!(
            count = self.config.thumbnail_count,
            deadline_ms = deadline.as_millis() as u64,
            "Run started"
        );

        let report = self.run_within(run_id, deadline).await;
        match &report {
            Ok(report) => info!(
                selected = report.selected,
                variant = report.variant.as_deref().unwrap_or("none"),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Run completed"
            ),
            Err(e) => error!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Run failed"
            ),
        }
        report
    }

    async fn run_within(&self, run_id: &str, deadline: Duration) -> WorkerResult<RunReport> {
        let request = self.request();
        let pipeline = self.pipeline.clone();
        let extractor = Arc::clone(&self.extractor);
        let span = Span::current();

        let work = tokio::task::spawn_blocking(move || -> WorkerResult<(Selection, StageTimings)> {
            let _entered = span.enter();
            let mut timings = StageTimings::default();

            let stage = Instant::now();
            let frames = extractor.extract()?;
            timings.extract = stage.elapsed();
            info!(
                frames = frames.len(),
                elapsed_ms = timings.extract.as_millis() as u64,
                "Features extracted"
            );

            let stage = Instant::now();
            let outcome = match pipeline.run(frames, &request) {
                Ok(outcome) => (
                    outcome.records,
                    outcome.assignment.map(|a| a.variant),
                    outcome.stats,
                ),
                Err(e) => {
                    let e = WorkerError::from(e);
                    if !e.is_nothing_to_show() {
                        return Err(e);
                    }
                    warn!("No frame passed any scoring profile");
                    (Vec::new(), None, RunStats::default())
                }
            };
            timings.select = stage.elapsed();
            Ok((outcome, timings))
        });

        let ((records, variant, stats), timings) = match timeout(deadline, work).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(WorkerError::run_failed(format!(
                    "selection task aborted: {}",
                    join_error
                )))
            }
            Err(_) => return Err(WorkerError::Timeout(deadline)),
        };

        let stage = Instant::now();
        let batch = ThumbnailBatch::new(run_id, &self.config.content, records).with_variant(variant);
        let sidecar_path = self.sink.persist(&batch)?;
        info!(
            extract_ms = timings.extract.as_millis() as u64,
            select_ms = timings.select.as_millis() as u64,
            persist_ms = stage.elapsed().as_millis() as u64,
            "Stage timings"
        );

        Ok(RunReport {
            run_id: run_id.to_string(),
            sidecar_path,
            selected: batch.thumbnails.len(),
            variant: batch.variant,
            stats,
        })
    }
}
