//! Feature extractor adapters.
//!
//! The detector that turns decoded frames into [`FrameFeatures`] runs
//! outside this worker. Its output arrives as JSON lines, one frame per
//! line. A line that cannot be read is a failed extraction for that frame:
//! it is reported as an `Err` entry and the pipeline skips it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use vthumb_models::FrameFeatures;

use crate::error::{WorkerError, WorkerResult};

/// Per-frame extraction result; the error describes why the frame failed.
pub type FrameExtraction = Result<FrameFeatures, String>;

/// Source of per-frame features for one piece of content.
pub trait FeatureExtractor: Send + Sync {
    /// Features for every frame, in frame order.
    ///
    /// Fails only when the source as a whole is unavailable.
    fn extract(&self) -> WorkerResult<Vec<FrameExtraction>>;
}

/// Reads precomputed features from a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonLinesExtractor {
    path: PathBuf,
}

impl JsonLinesExtractor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse JSON lines. Blank lines are ignored.
pub fn parse_feature_lines<R: BufRead>(reader: R) -> WorkerResult<Vec<FrameExtraction>> {
    let mut frames = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        frames.push(
            serde_json::from_str::<FrameFeatures>(&line)
                .map_err(|e| format!("line {}: {}", number + 1, e)),
        );
    }
    Ok(frames)
}

impl FeatureExtractor for JsonLinesExtractor {
    fn extract(&self) -> WorkerResult<Vec<FrameExtraction>> {
        let file = File::open(&self.path).map_err(|e| {
            WorkerError::extraction_failed(format!("opening {}: {}", self.path.display(), e))
        })?;
        let frames = parse_feature_lines(BufReader::new(file))?;
        debug!(
            path = %self.path.display(),
            frames = frames.len(),
            failed = frames.iter().filter(|f| f.is_err()).count(),
            "Read frame features"
        );
        Ok(frames)
    }
}
