//! End-to-end selection for one request.
//!
//! classify → score under every profile (parallel) → merge → personalize →
//! experiment boost → diversity selection → persistence records.
//!
//! Every stage consumes immutable input and returns a new value. The only
//! parallel section is scoring, which shares the analyzed frames read-only.
//! Deadlines are the caller's business.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use vthumb_models::{CandidateSet, ExperimentConfig, FrameFeatures, ThumbnailRecord, UserProfile};

use crate::classifier::{SceneAnalyzer, SceneClassifier};
use crate::config::PipelineConfig;
use crate::error::SelectResult;
use crate::experiment::{self, Assignment};
use crate::merger::SourceMerger;
use crate::metrics;
use crate::personalization::{PersonalizationReranker, PersonalizationWeights};
use crate::profile::ProfileRegistry;
use crate::scorer::{AnalyzedFrame, CandidateScorer};
use crate::selector::{DiversitySelector, SelectedThumbnail};

/// Parameters of one selection request.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    /// Number of thumbnails wanted
    pub count: usize,

    /// Genres of the content, used for genre alignment and personalization
    pub content_genres: Vec<String>,

    /// Viewer to personalize for
    pub user: Option<UserProfile>,

    /// Seed for experiment assignment; entropy when absent
    pub experiment_seed: Option<u64>,
}

impl SelectionRequest {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.experiment_seed = Some(seed);
        self
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub frames_total: usize,
    pub frames_skipped: usize,

    /// Accepted candidates per scoring profile, before merging
    pub candidates_per_source: BTreeMap<String, usize>,

    pub merged: usize,
    pub selected: usize,
}

/// Result of one selection request.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionOutcome {
    pub thumbnails: Vec<SelectedThumbnail>,

    /// One record per thumbnail, ids starting at 1
    pub records: Vec<ThumbnailRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,

    pub stats: RunStats,
}

/// The selection core wired together from a [`PipelineConfig`].
#[derive(Clone)]
pub struct ThumbnailPipeline {
    analyzer: Arc<dyn SceneAnalyzer>,
    registry: ProfileRegistry,
    merger: SourceMerger,
    selector: DiversitySelector,
    personalization: PersonalizationWeights,
    experiment: Option<ExperimentConfig>,
}

impl fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("profiles", &self.registry.ids())
            .field("merger", &self.merger)
            .field("selector", &self.selector)
            .field("experiment", &self.experiment.as_ref().map(|e| &e.id))
            .finish()
    }
}

impl ThumbnailPipeline {
    pub fn new(config: PipelineConfig) -> SelectResult<Self> {
        config.validate()?;
        let registry = config.registry()?;

        Ok(Self {
            analyzer: Arc::new(SceneClassifier::new(config.classifier)),
            registry,
            merger: SourceMerger::new(config.merge)?,
            selector: DiversitySelector::new(config.selector),
            personalization: config.personalization,
            experiment: config.experiment,
        })
    }

    /// Replace the built-in classifier.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn SceneAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Classify every frame that was extracted successfully.
    ///
    /// Failed extractions and invalid features are skipped, never fatal.
    /// Returns the analyzed frames and the number skipped.
    pub fn classify_frames<I, E>(&self, frames: I) -> (Vec<AnalyzedFrame>, usize)
    where
        I: IntoIterator<Item = Result<FrameFeatures, E>>,
        E: fmt::Display,
    {
        let mut analyzed = Vec::new();
        let mut skipped = 0usize;

        for frame in frames {
            let features = match frame {
                Ok(features) => features,
                Err(e) => {
                    warn!(error = %e, "Feature extraction failed, skipping frame");
                    metrics::record_frame_skipped("extraction_failed");
                    skipped += 1;
                    continue;
                }
            };
            if let Err(e) = features.validate() {
                warn!(
                    frame_index = features.frame_index,
                    error = %e,
                    "Invalid frame features, skipping frame"
                );
                metrics::record_frame_skipped("invalid_features");
                skipped += 1;
                continue;
            }

            let scene = self.analyzer.analyze(&features);
            metrics::record_frame_classified();
            analyzed.push(AnalyzedFrame::new(features.frame_ref(), scene));
        }

        (analyzed, skipped)
    }

    /// Score the frames under every profile, one candidate set per profile
    /// in registry order.
    pub fn score_all(&self, frames: &[AnalyzedFrame], content_genres: &[String]) -> Vec<CandidateSet> {
        self.registry
            .profiles()
            .par_iter()
            .map(|profile| {
                CandidateScorer::new(profile)
                    .with_genres(content_genres)
                    .score_frames(frames)
            })
            .collect()
    }

    /// Run the full pipeline for one request.
    ///
    /// Fails with an input error when no profile accepted any frame.
    pub fn run<I, E>(&self, frames: I, request: &SelectionRequest) -> SelectResult<SelectionOutcome>
    where
        I: IntoIterator<Item = Result<FrameFeatures, E>>,
        E: fmt::Display,
    {
        let started = Instant::now();

        let (analyzed, skipped) = self.classify_frames(frames);
        let mut stats = RunStats {
            frames_total: analyzed.len() + skipped,
            frames_skipped: skipped,
            ..RunStats::default()
        };
        debug!(frames = analyzed.len(), skipped, "Classified frames");

        let sources = self.score_all(&analyzed, &request.content_genres);
        for (profile, set) in self.registry.profiles().iter().zip(&sources) {
            stats
                .candidates_per_source
                .insert(profile.id.to_string(), set.len());
        }

        let mut candidates = self.merger.merge(&sources)?;
        stats.merged = candidates.len();

        let mut assignment = None;
        if let Some(user) = &request.user {
            candidates = PersonalizationReranker::new(request.content_genres.clone())
                .with_weights(self.personalization.clone())
                .rerank(&candidates, user);

            if let Some(config) = &self.experiment {
                let assigned = match request.experiment_seed {
                    Some(seed) => experiment::assign(user, config, &mut StdRng::seed_from_u64(seed)),
                    None => experiment::assign(user, config, &mut rand::rng()),
                };
                candidates = experiment::apply_boost(&candidates, config, &assigned.variant);
                assignment = Some(assigned);
            }
        }

        let thumbnails = self.selector.select(&candidates, request.count);
        let records: Vec<ThumbnailRecord> = thumbnails
            .iter()
            .zip(1u32..)
            .map(|(pick, id)| ThumbnailRecord::from_candidate(id, &pick.candidate, pick.label.clone()))
            .collect();
        stats.selected = records.len();

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_pipeline_duration(elapsed);
        info!(
            frames = stats.frames_total,
            skipped = stats.frames_skipped,
            merged = stats.merged,
            selected = stats.selected,
            variant = assignment.as_ref().map(|a| a.variant.as_str()).unwrap_or("none"),
            duration_ms = (elapsed * 1000.0) as u64,
            "Thumbnail selection complete"
        );

        Ok(SelectionOutcome {
            thumbnails,
            records,
            assignment,
            stats,
        })
    }
}
