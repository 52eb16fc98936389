//! Persistence adapters.
//!
//! The selection core hands over one [`ThumbnailRecord`] per selected
//! candidate. Resolving the frame handle to pixels and encoding the image is
//! the image writer's job; this module owns the JSON metadata sidecar.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use vthumb_models::{Composition, SceneType, ThumbnailRecord};

use crate::config::ContentInfo;
use crate::error::{WorkerError, WorkerResult};

/// Everything persisted for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailBatch {
    pub run_id: String,
    pub content_id: String,
    pub title: String,
    pub genres: Vec<String>,
    pub generated_at: DateTime<Utc>,

    /// Experiment variant the run was boosted with, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    pub thumbnails: Vec<ThumbnailRecord>,
    pub statistics: BatchStatistics,
}

/// Summary of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_thumbnails: usize,
    pub per_source: BTreeMap<String, usize>,
    pub scene_types: BTreeSet<SceneType>,
    pub compositions: BTreeSet<Composition>,
}

impl BatchStatistics {
    pub fn from_records(records: &[ThumbnailRecord]) -> Self {
        let mut stats = Self {
            total_thumbnails: records.len(),
            ..Self::default()
        };
        for record in records {
            *stats.per_source.entry(record.source.to_string()).or_default() += 1;
            stats.scene_types.insert(record.scene_type);
            stats.compositions.insert(record.composition);
        }
        stats
    }
}

impl ThumbnailBatch {
    pub fn new(run_id: &str, content: &ContentInfo, records: Vec<ThumbnailRecord>) -> Self {
        Self {
            run_id: run_id.to_string(),
            content_id: content.content_id.clone(),
            title: content.title.clone(),
            genres: content.genres.clone(),
            generated_at: Utc::now(),
            variant: None,
            statistics: BatchStatistics::from_records(&records),
            thumbnails: records,
        }
    }

    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant;
        self
    }
}

/// Destination for a selected batch.
pub trait ThumbnailSink: Send + Sync {
    /// Persist a batch and return where it went.
    fn persist(&self, batch: &ThumbnailBatch) -> WorkerResult<PathBuf>;
}

/// Writes `<content_id>_thumbnails.json` into an output directory.
#[derive(Debug, Clone)]
pub struct JsonMetadataSink {
    output_dir: PathBuf,
}

impl JsonMetadataSink {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Sidecar path for a content id. Path separators in the id are replaced.
    pub fn sidecar_path(&self, content_id: &str) -> PathBuf {
        let safe: String = content_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.output_dir.join(format!("{}_thumbnails.json", safe))
    }
}

impl ThumbnailSink for JsonMetadataSink {
    fn persist(&self, batch: &ThumbnailBatch) -> WorkerResult<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            WorkerError::persist_failed(format!("creating {}: {}", self.output_dir.display(), e))
        })?;

        let path = self.sidecar_path(&batch.content_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(batch)?;
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| WorkerError::persist_failed(format!("writing {}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            thumbnails = batch.thumbnails.len(),
            "Wrote thumbnail metadata"
        );
        Ok(path)
    }
}
