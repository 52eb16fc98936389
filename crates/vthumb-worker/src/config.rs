//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use vthumb_models::UserProfile;
use vthumb_select::PipelineConfig;

use crate::error::{WorkerError, WorkerResult};

/// What the thumbnails are being selected for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentInfo {
    pub content_id: String,
    pub title: String,
    pub genres: Vec<String>,
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// JSON-lines file of per-frame features
    pub features_path: Option<PathBuf>,
    /// Directory the metadata sidecar is written to
    pub output_dir: PathBuf,
    /// Optional pipeline configuration JSON
    pub pipeline_config_path: Option<PathBuf>,
    /// Optional user profile JSON to personalize for
    pub user_profile_path: Option<PathBuf>,
    /// Number of thumbnails to select
    pub thumbnail_count: usize,
    /// Deadline for one full run
    pub run_timeout: Duration,
    /// Seed for experiment assignment
    pub experiment_seed: Option<u64>,
    pub content: ContentInfo,
    /// Where to write the Prometheus snapshot at the end of a run
    pub metrics_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            features_path: None,
            output_dir: PathBuf::from("./thumbnails"),
            pipeline_config_path: None,
            user_profile_path: None,
            thumbnail_count: 20,
            run_timeout: Duration::from_secs(300), // 5 minutes
            experiment_seed: None,
            content: ContentInfo {
                content_id: "content".to_string(),
                title: String::new(),
                genres: Vec::new(),
            },
            metrics_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        Self {
            features_path: path("VTHUMB_FEATURES_PATH"),
            output_dir: path("VTHUMB_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            pipeline_config_path: path("VTHUMB_PIPELINE_CONFIG"),
            user_profile_path: path("VTHUMB_USER_PROFILE"),
            thumbnail_count: lookup("VTHUMB_THUMBNAIL_COUNT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thumbnail_count),
            run_timeout: lookup("VTHUMB_RUN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_timeout),
            experiment_seed: lookup("VTHUMB_EXPERIMENT_SEED").and_then(|s| s.parse().ok()),
            content: ContentInfo {
                content_id: lookup("VTHUMB_CONTENT_ID").unwrap_or(defaults.content.content_id),
                title: lookup("VTHUMB_TITLE").unwrap_or_default(),
                genres: lookup("VTHUMB_GENRES")
                    .map(|s| {
                        s.split(',')
                            .map(|g| g.trim().to_string())
                            .filter(|g| !g.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            metrics_path: path("VTHUMB_METRICS_PATH"),
        }
    }

    /// Path of the features file, which every run needs.
    pub fn require_features_path(&self) -> WorkerResult<&Path> {
        self.features_path
            .as_deref()
            .ok_or_else(|| WorkerError::config_error("VTHUMB_FEATURES_PATH is not set"))
    }

    /// Load the pipeline configuration, or the defaults when none is set.
    pub fn load_pipeline_config(&self) -> WorkerResult<PipelineConfig> {
        match &self.pipeline_config_path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    WorkerError::config_error(format!("reading {}: {}", path.display(), e))
                })?;
                Ok(PipelineConfig::from_json(&json)?)
            }
            None => Ok(PipelineConfig::default()),
        }
    }

    /// Load the user profile, if one is configured.
    pub fn load_user_profile(&self) -> WorkerResult<Option<UserProfile>> {
        let Some(path) = &self.user_profile_path else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::config_error(format!("reading {}: {}", path.display(), e)))?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WorkerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.thumbnail_count, 20);
        assert_eq!(config.run_timeout, Duration::from_secs(300));
        assert!(config.features_path.is_none());
        assert!(config.require_features_path().is_err());
        assert!(config.content.genres.is_empty());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("VTHUMB_FEATURES_PATH", "/data/features.jsonl"),
            ("VTHUMB_THUMBNAIL_COUNT", "8"),
            ("VTHUMB_RUN_TIMEOUT_SECS", "30"),
            ("VTHUMB_EXPERIMENT_SEED", "42"),
            ("VTHUMB_GENRES", "Drama, crime,,"),
            ("VTHUMB_CONTENT_ID", "movie-1"),
        ]));

        assert_eq!(config.require_features_path().unwrap(), Path::new("/data/features.jsonl"));
        assert_eq!(config.thumbnail_count, 8);
        assert_eq!(config.run_timeout, Duration::from_secs(30));
        assert_eq!(config.experiment_seed, Some(42));
        assert_eq!(config.content.genres, vec!["Drama", "crime"]);
        assert_eq!(config.content.content_id, "movie-1");
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let config = WorkerConfig::from_lookup(lookup(&[("VTHUMB_THUMBNAIL_COUNT", "lots")]));
        assert_eq!(config.thumbnail_count, 20);
    }

    #[test]
    fn test_load_pipeline_and_user_files() {
        let mut pipeline_file = tempfile::NamedTempFile::new().unwrap();
        write!(pipeline_file, r#"{{"merge": {{"proximity_seconds": 3.0}}}}"#).unwrap();
        let mut user_file = tempfile::NamedTempFile::new().unwrap();
        write!(user_file, r#"{{"user_id": "viewer", "preferred_genres": ["comedy"]}}"#).unwrap();

        let config = WorkerConfig {
            pipeline_config_path: Some(pipeline_file.path().to_path_buf()),
            user_profile_path: Some(user_file.path().to_path_buf()),
            ..WorkerConfig::default()
        };

        assert_eq!(config.load_pipeline_config().unwrap().merge.proximity_seconds, 3.0);
        let user = config.load_user_profile().unwrap().unwrap();
        assert_eq!(user.preferred_genres, vec!["comedy"]);
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let config = WorkerConfig {
            pipeline_config_path: Some(PathBuf::from("/nonexistent/pipeline.json")),
            ..WorkerConfig::default()
        };
        assert!(config.load_pipeline_config().unwrap_err().is_configuration());
    }
}
