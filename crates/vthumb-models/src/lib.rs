//! Shared data models for the vthumb thumbnail selection pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Per-frame feature descriptors produced by the external detector
//! - Scene analysis categories (scene type, composition, emotion)
//! - Scored candidates and candidate sets
//! - User profiles and experiment configuration
//! - Records handed to the persistence collaborator

pub mod candidate;
pub mod error;
pub mod experiment;
pub mod frame;
pub mod record;
pub mod scene;
pub mod user;

// Re-export common types
pub use candidate::{Candidate, CandidateSet, ProfileId, Provenance};
pub use error::{ModelError, ModelResult};
pub use experiment::{
    BoostRule, ExperimentConfig, ExperimentStatus, VariantSpec, CONTROL_VARIANT, TRAFFIC_SUM_TOLERANCE,
};
pub use frame::{BoundingBox, FrameFeatures, FrameRef, Subject};
pub use record::ThumbnailRecord;
pub use scene::{thumbnail_type_key, Composition, Emotion, Prominence, SceneAnalysis, SceneType, Setting};
pub use user::{ExperimentAssignment, FeedbackEvent, UserProfile};
