//! Data-only scoring profiles.
//!
//! A profile is a named weighting configuration: one weight and one scale
//! per [`ScoreFeature`], categorical score tables for composition and scene
//! relevance, and an acceptance threshold. Different "studios" are different
//! profiles run through the same scorer; nothing here branches on a profile
//! name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use vthumb_models::{Composition, ProfileId, SceneType};

use crate::error::{SelectError, SelectResult};

/// Id of the built-in character-driven profile.
pub const CHARACTER_PROFILE: &str = "character";

/// Id of the built-in frame-quality profile.
pub const QUALITY_PROFILE: &str = "quality";

/// Sub-scores a profile can weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFeature {
    /// Prominence-weighted subject count
    SubjectProminence,
    /// Raw subject count
    SubjectCount,
    VisualInterest,
    /// Composition table lookup
    Composition,
    ColorSaturation,
    /// Scene type against the allow-list
    SceneRelevance,
    FamilyFriendly,
}

impl ScoreFeature {
    pub const ALL: &'static [ScoreFeature] = &[
        ScoreFeature::SubjectProminence,
        ScoreFeature::SubjectCount,
        ScoreFeature::VisualInterest,
        ScoreFeature::Composition,
        ScoreFeature::ColorSaturation,
        ScoreFeature::SceneRelevance,
        ScoreFeature::FamilyFriendly,
    ];

    /// Scale used when a profile does not set one.
    pub fn default_scale(&self) -> f64 {
        match self {
            Self::SubjectProminence => 2.0,
            Self::SubjectCount => 1.0,
            Self::VisualInterest => 2.0,
            Self::Composition => 1.0,
            Self::ColorSaturation => 3.0,
            Self::SceneRelevance => 1.0,
            Self::FamilyFriendly => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubjectProminence => "subject_prominence",
            Self::SubjectCount => "subject_count",
            Self::VisualInterest => "visual_interest",
            Self::Composition => "composition",
            Self::ColorSaturation => "color_saturation",
            Self::SceneRelevance => "scene_relevance",
            Self::FamilyFriendly => "family_friendly",
        }
    }
}

/// Named, immutable weighting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub id: ProfileId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Weight per feature; missing features contribute nothing
    #[serde(default)]
    pub weights: BTreeMap<ScoreFeature, f64>,

    /// Scale per feature; missing features use [`ScoreFeature::default_scale`]
    #[serde(default)]
    pub scales: BTreeMap<ScoreFeature, f64>,

    /// Composition bonus table
    #[serde(default)]
    pub composition_scores: BTreeMap<Composition, f64>,

    /// Bonus for compositions missing from the table
    #[serde(default = "default_one")]
    pub default_composition_score: f64,

    /// Scene types this profile considers relevant
    #[serde(default)]
    pub relevant_scene_types: BTreeSet<SceneType>,

    #[serde(default = "default_relevant_score")]
    pub relevant_scene_score: f64,

    #[serde(default = "default_one")]
    pub other_scene_score: f64,

    /// Credit for a prominent (not very prominent) subject; very prominent
    /// subjects count 1.0
    #[serde(default = "default_prominent_credit")]
    pub prominent_tier_credit: f64,

    /// Candidates scoring below this are dropped before ranking
    #[serde(default)]
    pub acceptance_threshold: f64,

    /// Keep at most this many candidates per run
    #[serde(default = "default_max_candidates")]
    pub max_candidates: Option<usize>,

    /// Drop analyses that are not flagged family-friendly
    #[serde(default)]
    pub require_family_friendly: bool,
}

fn default_one() -> f64 {
    1.0
}

fn default_relevant_score() -> f64 {
    2.0
}

fn default_prominent_credit() -> f64 {
    0.5
}

fn default_max_candidates() -> Option<usize> {
    Some(50)
}

impl ScoringProfile {
    /// Create an empty profile: every feature weighted zero.
    pub fn new(id: impl Into<ProfileId>) -> Self {
        Self {
            id: id.into(),
            description: None,
            weights: BTreeMap::new(),
            scales: BTreeMap::new(),
            composition_scores: BTreeMap::new(),
            default_composition_score: 1.0,
            relevant_scene_types: BTreeSet::new(),
            relevant_scene_score: 2.0,
            other_scene_score: 1.0,
            prominent_tier_credit: 0.5,
            acceptance_threshold: 0.0,
            max_candidates: default_max_candidates(),
            require_family_friendly: false,
        }
    }

    pub fn with_weight(mut self, feature: ScoreFeature, weight: f64) -> Self {
        self.weights.insert(feature, weight);
        self
    }

    pub fn with_scale(mut self, feature: ScoreFeature, scale: f64) -> Self {
        self.scales.insert(feature, scale);
        self
    }

    pub fn with_composition_score(mut self, composition: Composition, score: f64) -> Self {
        self.composition_scores.insert(composition, score);
        self
    }

    pub fn with_relevant_scene_types(mut self, scene_types: impl IntoIterator<Item = SceneType>) -> Self {
        self.relevant_scene_types = scene_types.into_iter().collect();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    pub fn with_max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Character-driven profile: rewards prominent subjects and tight
    /// compositions.
    pub fn character() -> Self {
        Self::new(CHARACTER_PROFILE)
            .with_description("Prominent characters, close compositions")
            .with_weight(ScoreFeature::SubjectProminence, 0.4)
            .with_weight(ScoreFeature::VisualInterest, 0.2)
            .with_weight(ScoreFeature::Composition, 0.15)
            .with_weight(ScoreFeature::ColorSaturation, 0.1)
            .with_weight(ScoreFeature::SceneRelevance, 0.1)
            .with_weight(ScoreFeature::FamilyFriendly, 0.05)
            .with_composition_score(Composition::Closeup, 3.0)
            .with_composition_score(Composition::Duo, 2.5)
            .with_composition_score(Composition::Ensemble, 2.0)
            .with_composition_score(Composition::Wide, 1.0)
            .with_relevant_scene_types([
                SceneType::Ensemble,
                SceneType::Duo,
                SceneType::CharacterFocus,
            ])
            .with_threshold(0.3)
    }

    /// Frame-quality profile: rewards visually busy, colorful frames with
    /// people in them.
    pub fn quality() -> Self {
        Self::new(QUALITY_PROFILE)
            .with_description("Visual quality with a bonus per person")
            .with_weight(ScoreFeature::VisualInterest, 0.6)
            .with_scale(ScoreFeature::VisualInterest, 1.0)
            .with_weight(ScoreFeature::SubjectCount, 0.2)
            .with_weight(ScoreFeature::ColorSaturation, 0.1)
            .with_scale(ScoreFeature::ColorSaturation, 1.0)
            .with_weight(ScoreFeature::Composition, 0.1)
            .with_composition_score(Composition::Closeup, 1.0)
            .with_composition_score(Composition::Mid, 0.8)
            .with_composition_score(Composition::Duo, 0.8)
            .with_composition_score(Composition::Ensemble, 0.7)
            .with_composition_score(Composition::Wide, 0.5)
            .with_threshold(0.0)
    }

    /// Weight for a feature (0 when unset).
    pub fn weight(&self, feature: ScoreFeature) -> f64 {
        self.weights.get(&feature).copied().unwrap_or(0.0)
    }

    /// Scale for a feature.
    pub fn scale(&self, feature: ScoreFeature) -> f64 {
        self.scales
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.default_scale())
    }

    /// Composition bonus from the table.
    pub fn composition_score(&self, composition: Composition) -> f64 {
        self.composition_scores
            .get(&composition)
            .copied()
            .unwrap_or(self.default_composition_score)
    }

    /// Scene relevance against the allow-list.
    pub fn scene_relevance(&self, scene_type: SceneType) -> f64 {
        if self.relevant_scene_types.contains(&scene_type) {
            self.relevant_scene_score
        } else {
            self.other_scene_score
        }
    }

    /// Check every number in the profile is usable.
    pub fn validate(&self) -> SelectResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(SelectError::configuration("scoring profile id is empty"));
        }

        let numbers = self
            .weights
            .iter()
            .map(|(f, w)| (format!("weight {}", f.as_str()), *w))
            .chain(
                self.scales
                    .iter()
                    .map(|(f, s)| (format!("scale {}", f.as_str()), *s)),
            )
            .chain([
                ("default_composition_score".to_string(), self.default_composition_score),
                ("relevant_scene_score".to_string(), self.relevant_scene_score),
                ("other_scene_score".to_string(), self.other_scene_score),
                ("prominent_tier_credit".to_string(), self.prominent_tier_credit),
            ]);

        for (name, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectError::configuration(format!(
                    "profile {}: {} must be a non-negative number, got {}",
                    self.id, name, value
                )));
            }
        }

        if let Some((composition, value)) = self
            .composition_scores
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(SelectError::configuration(format!(
                "profile {}: composition score for {} must be non-negative, got {}",
                self.id, composition, value
            )));
        }

        if !self.acceptance_threshold.is_finite() {
            return Err(SelectError::configuration(format!(
                "profile {}: acceptance threshold must be finite",
                self.id
            )));
        }

        Ok(())
    }
}

/// Ordered collection of scoring profiles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileRegistry {
    profiles: Vec<ScoringProfile>,
}

impl ProfileRegistry {
    /// Build a registry, rejecting invalid or duplicate profiles.
    pub fn new(profiles: Vec<ScoringProfile>) -> SelectResult<Self> {
        let mut registry = Self::default();
        for profile in profiles {
            registry.insert(profile)?;
        }
        Ok(registry)
    }

    /// The built-in quality and character profiles.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![ScoringProfile::quality(), ScoringProfile::character()],
        }
    }

    /// Add a profile.
    pub fn insert(&mut self, profile: ScoringProfile) -> SelectResult<()> {
        profile.validate()?;
        if self.contains(&profile.id) {
            return Err(SelectError::configuration(format!(
                "duplicate scoring profile {}",
                profile.id
            )));
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Look up a profile by id.
    pub fn get(&self, id: &ProfileId) -> SelectResult<&ScoringProfile> {
        self.profiles
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| SelectError::unknown_profile(id.as_str()))
    }

    pub fn contains(&self, id: &ProfileId) -> bool {
        self.profiles.iter().any(|p| &p.id == id)
    }

    pub fn ids(&self) -> Vec<ProfileId> {
        self.profiles.iter().map(|p| p.id.clone()).collect()
    }

    pub fn profiles(&self) -> &[ScoringProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_are_valid() {
        assert!(ScoringProfile::character().validate().is_ok());
        assert!(ScoringProfile::quality().validate().is_ok());
        assert_eq!(ProfileRegistry::builtin().len(), 2);
    }

    #[test]
    fn test_missing_weight_contributes_zero() {
        let profile = ScoringProfile::new("empty");
        assert_eq!(profile.weight(ScoreFeature::VisualInterest), 0.0);
        assert_eq!(profile.scale(ScoreFeature::ColorSaturation), 3.0);
        assert_eq!(profile.composition_score(Composition::Mid), 1.0);
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let profile = ScoringProfile::new("bad").with_weight(ScoreFeature::Composition, -0.1);
        let err = profile.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_rejects_nan_table_entry() {
        let profile = ScoringProfile::new("bad").with_composition_score(Composition::Wide, f64::NAN);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_registry_rejects_duplicates_and_reports_unknown() {
        let err = ProfileRegistry::new(vec![ScoringProfile::character(), ScoringProfile::character()])
            .unwrap_err();
        assert!(err.is_configuration());

        let registry = ProfileRegistry::builtin();
        assert!(registry.get(&ProfileId::from("character")).is_ok());
        assert!(matches!(
            registry.get(&ProfileId::from("studio_c")),
            Err(SelectError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_profile_json_uses_snake_case_keys() {
        let json = r#"{
            "id": "studio_b",
            "weights": {"visual_interest": 0.5, "composition": 0.5},
            "composition_scores": {"closeup": 2.0},
            "relevant_scene_types": ["hero"],
            "acceptance_threshold": 0.2
        }"#;
        let profile: ScoringProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.weight(ScoreFeature::VisualInterest), 0.5);
        assert_eq!(profile.composition_score(Composition::Closeup), 2.0);
        assert_eq!(profile.scene_relevance(SceneType::Hero), 2.0);
        assert_eq!(profile.max_candidates, Some(50));
        assert!(profile.validate().is_ok());
    }
}
