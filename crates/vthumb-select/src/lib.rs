//! Thumbnail candidate selection.
//!
//! This crate provides:
//! - Rule-based scene classification from frame feature descriptors
//! - Data-only scoring profiles and a single weighted-sum scorer
//! - Priority-ordered merging of candidate sources with a proximity window
//! - Diversity-aware top-N selection over shot categories
//! - Per-user reranking and experiment variant assignment
//! - Concurrency-safe engagement accumulators

pub mod classifier;
pub mod config;
pub mod engagement;
pub mod error;
pub mod experiment;
pub mod merger;
pub mod metrics;
pub mod personalization;
pub mod pipeline;
pub mod profile;
pub mod scorer;
pub mod selector;

pub use classifier::{ClassifierConfig, SceneAnalyzer, SceneClassifier, MAX_ACTION_LEVEL};
pub use config::PipelineConfig;
pub use engagement::{
    EngagementCounts, EngagementLedger, ExperimentResults, MetricSummary, VariantAnalysis,
    PRIMARY_METRIC,
};
pub use error::{SelectError, SelectResult};
pub use experiment::{apply_boost, assign, variant_for_draw, Assignment, AssignmentSource};
pub use merger::{merge_candidates, MergeConfig, SourceMerger, DEFAULT_PROXIMITY_SECONDS};
pub use personalization::{PersonalizationReranker, PersonalizationWeights};
pub use pipeline::{RunStats, SelectionOutcome, SelectionRequest, ThumbnailPipeline};
pub use profile::{
    ProfileRegistry, ScoreFeature, ScoringProfile, CHARACTER_PROFILE, QUALITY_PROFILE,
};
pub use scorer::{breakdown, genre_aligned, score, AnalyzedFrame, CandidateScorer, ScoreBreakdown};
pub use selector::{DiversitySelector, SelectedThumbnail, SelectorConfig, ShotCategory};
