//! Records handed to the persistence collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, ProfileId};
use crate::frame::FrameRef;
use crate::scene::{Composition, Emotion, SceneType};

/// Metadata for one selected thumbnail.
///
/// The persistence collaborator resolves `frame` to pixels, encodes the
/// image under `file_name` and writes these fields to its sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThumbnailRecord {
    /// Position in the final selection (1-based)
    pub id: u32,
    pub source: ProfileId,
    pub timestamp: f64,
    pub scene_type: SceneType,
    pub composition: Composition,
    pub character_count: usize,
    pub score: f64,
    pub description: String,

    /// Bucket label such as `hero_closeup` or `diverse_shot_2`
    pub label: String,
    pub emotion: Emotion,
    pub action_level: u8,

    /// Suggested image file name
    pub file_name: String,

    pub frame: FrameRef,
}

impl ThumbnailRecord {
    /// Build the record for the `id`-th selected candidate.
    pub fn from_candidate(id: u32, candidate: &Candidate, label: impl Into<String>) -> Self {
        let scene = &candidate.scene;
        Self {
            id,
            source: candidate.source.clone(),
            timestamp: candidate.timestamp,
            scene_type: scene.scene_type,
            composition: scene.composition,
            character_count: scene.subject_count,
            score: candidate.score,
            description: scene.description(),
            label: label.into(),
            emotion: scene.emotion,
            action_level: scene.action_level,
            file_name: format!(
                "{:02}_{}_{}_t{:.2}.jpg",
                id, candidate.source, scene.scene_type, candidate.timestamp
            ),
            frame: candidate.frame_ref(),
        }
    }
}
