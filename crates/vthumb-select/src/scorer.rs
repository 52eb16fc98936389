//! Candidate scoring under a data-only profile.
//!
//! `score` is a weighted sum of sub-scores. Each sub-score is a raw value
//! taken from the scene analysis multiplied by the profile's scale for that
//! feature, so every number that distinguishes one profile from another
//! lives in [`ScoringProfile`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use vthumb_models::{Candidate, CandidateSet, FrameRef, SceneAnalysis, SceneType};

use crate::metrics;
use crate::profile::{ScoreFeature, ScoringProfile};

/// Genres whose content only aligns with character-driven scene types.
const CHARACTER_DRIVEN_GENRES: &[&str] = &["drama", "crime"];

/// Scene types that suit character-driven genres.
const CHARACTER_DRIVEN_SCENES: &[SceneType] = &[
    SceneType::Ensemble,
    SceneType::Duo,
    SceneType::CharacterFocus,
];

/// A classified frame, ready to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedFrame {
    pub frame: FrameRef,
    pub scene: SceneAnalysis,
}

impl AnalyzedFrame {
    pub fn new(frame: FrameRef, scene: SceneAnalysis) -> Self {
        Self { frame, scene }
    }
}

/// Per-feature contributions to a score.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub contributions: BTreeMap<ScoreFeature, f64>,
}

impl ScoreBreakdown {
    /// Sum of all contributions, floored at zero.
    pub fn total(&self) -> f64 {
        let total: f64 = self.contributions.values().sum();
        if total.is_finite() {
            total.max(0.0)
        } else {
            0.0
        }
    }
}

/// Raw, unweighted value of one feature for a scene.
fn raw_value(feature: ScoreFeature, scene: &SceneAnalysis, profile: &ScoringProfile) -> f64 {
    let value = match feature {
        ScoreFeature::SubjectProminence => {
            let prominent_only = scene.prominent_count.saturating_sub(scene.very_prominent_count);
            scene.very_prominent_count as f64 + prominent_only as f64 * profile.prominent_tier_credit
        }
        ScoreFeature::SubjectCount => scene.subject_count as f64,
        ScoreFeature::VisualInterest => scene.visual_interest,
        ScoreFeature::Composition => profile.composition_score(scene.composition),
        ScoreFeature::ColorSaturation => scene.color_saturation,
        ScoreFeature::SceneRelevance => profile.scene_relevance(scene.scene_type),
        ScoreFeature::FamilyFriendly => {
            if scene.family_friendly {
                1.0
            } else {
                0.0
            }
        }
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Break a score down into its weighted sub-scores.
pub fn breakdown(scene: &SceneAnalysis, profile: &ScoringProfile) -> ScoreBreakdown {
    let contributions = ScoreFeature::ALL
        .iter()
        .map(|&feature| {
            let weighted =
                profile.weight(feature) * profile.scale(feature) * raw_value(feature, scene, profile);
            (feature, weighted)
        })
        .collect();
    ScoreBreakdown { contributions }
}

/// Score one scene analysis under a profile. Pure and never negative.
pub fn score(scene: &SceneAnalysis, profile: &ScoringProfile) -> f64 {
    breakdown(scene, profile).total()
}

/// Whether a scene type suits the content genres.
pub fn genre_aligned(scene_type: SceneType, content_genres: &[String]) -> bool {
    let character_driven = content_genres.iter().any(|genre| {
        CHARACTER_DRIVEN_GENRES
            .iter()
            .any(|g| genre.trim().eq_ignore_ascii_case(g))
    });
    !character_driven || CHARACTER_DRIVEN_SCENES.contains(&scene_type)
}

/// Scores a frame sequence under one profile.
#[derive(Debug, Clone)]
pub struct CandidateScorer<'a> {
    profile: &'a ScoringProfile,
    content_genres: &'a [String],
}

impl<'a> CandidateScorer<'a> {
    pub fn new(profile: &'a ScoringProfile) -> Self {
        Self {
            profile,
            content_genres: &[],
        }
    }

    /// Genres of the content being processed.
    pub fn with_genres(mut self, genres: &'a [String]) -> Self {
        self.content_genres = genres;
        self
    }

    pub fn profile(&self) -> &ScoringProfile {
        self.profile
    }

    /// Score every frame, keep those at or above the acceptance threshold
    /// and return them ranked.
    ///
    /// The diversity factor is computed in frame order against candidates
    /// already accepted by this profile. It only breaks score ties.
    pub fn score_frames(&self, frames: &[AnalyzedFrame]) -> CandidateSet {
        let profile = self.profile;
        let mut seen_per_scene: HashMap<SceneType, usize> = HashMap::new();
        let mut accepted = Vec::new();

        for frame in frames {
            if profile.require_family_friendly && !frame.scene.family_friendly {
                debug!(
                    profile = %profile.id,
                    timestamp = frame.frame.timestamp,
                    "Dropping frame not flagged family-friendly"
                );
                continue;
            }

            let value = score(&frame.scene, profile);
            if value < profile.acceptance_threshold {
                continue;
            }

            let seen = seen_per_scene.entry(frame.scene.scene_type).or_insert(0);
            let diversity_factor = 1.0 / (1.0 + *seen as f64);
            *seen += 1;

            accepted.push(
                Candidate::new(frame.frame, profile.id.clone(), frame.scene.clone(), value)
                    .with_diversity_factor(diversity_factor)
                    .with_genre_aligned(genre_aligned(frame.scene.scene_type, self.content_genres)),
            );
        }

        accepted.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.diversity_factor.total_cmp(&a.diversity_factor))
                .then_with(|| a.timestamp.total_cmp(&b.timestamp))
        });
        let accepted_count = accepted.len();
        if let Some(max) = profile.max_candidates {
            accepted.truncate(max);
        }

        metrics::record_profile_scored(profile.id.as_str(), frames.len(), accepted_count);
        debug!(
            profile = %profile.id,
            frames = frames.len(),
            accepted = accepted_count,
            kept = accepted.len(),
            "Scored frames"
        );

        CandidateSet::from_candidates(accepted)
    }
}
