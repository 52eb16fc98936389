//! Batch thumbnail selection worker.
//!
//! This crate provides:
//! - Environment configuration
//! - Feature extractor and metadata sink adapters
//! - Deadline enforcement around one selection run

pub mod config;
pub mod error;
pub mod extractor;
pub mod runner;
pub mod sink;

pub use config::{ContentInfo, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use extractor::{FeatureExtractor, FrameExtraction, JsonLinesExtractor};
pub use runner::{RunReport, SelectionRunner};
pub use sink::{BatchStatistics, JsonMetadataSink, ThumbnailBatch, ThumbnailSink};
