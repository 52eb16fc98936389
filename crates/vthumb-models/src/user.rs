//! User profiles for personalization and experiments.
//!
//! A profile is a read-only snapshot inside the pipeline. The feedback loop
//! lives with the caller, which uses the `with_*` helpers to derive an
//! updated profile and stores it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scene::{thumbnail_type_key, Composition, Emotion, SceneType};

/// A user's membership in one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExperimentAssignment {
    pub experiment_id: String,
    pub variant: String,
}

impl ExperimentAssignment {
    pub fn new(experiment_id: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            variant: variant.into(),
        }
    }
}

/// Engagement event reported for a shown thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FeedbackEvent {
    Click,
    View { watch_time: f64 },
    Complete,
}

/// Per-user preference snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    pub user_id: String,

    #[serde(default)]
    pub preferred_genres: Vec<String>,

    #[serde(default)]
    pub preferred_scene_types: Vec<SceneType>,

    #[serde(default)]
    pub composition_preferences: Vec<Composition>,

    #[serde(default)]
    pub emotion_preferences: Vec<Emotion>,

    /// Click-through rate keyed by `{scene_type}_{composition}`
    #[serde(default)]
    pub click_through_rates: BTreeMap<String, f64>,

    /// Thumbnail types the user has clicked, oldest first
    #[serde(default)]
    pub thumbnail_types_clicked: Vec<String>,

    /// Accumulated watch time (seconds) keyed by thumbnail type
    #[serde(default)]
    pub watch_times: BTreeMap<String, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_experiment: Option<ExperimentAssignment>,
}

impl UserProfile {
    /// Create an empty profile.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scene_types(mut self, scene_types: Vec<SceneType>) -> Self {
        self.preferred_scene_types = scene_types;
        self
    }

    pub fn with_compositions(mut self, compositions: Vec<Composition>) -> Self {
        self.composition_preferences = compositions;
        self
    }

    pub fn with_emotions(mut self, emotions: Vec<Emotion>) -> Self {
        self.emotion_preferences = emotions;
        self
    }

    pub fn with_click_rate(mut self, key: impl Into<String>, rate: f64) -> Self {
        self.click_through_rates.insert(key.into(), rate);
        self
    }

    /// Record an experiment assignment.
    pub fn with_assignment(mut self, assignment: ExperimentAssignment) -> Self {
        self.active_experiment = Some(assignment);
        self
    }

    /// Historical click-through rate for a (scene type, composition) pair.
    pub fn click_rate(&self, scene_type: SceneType, composition: Composition) -> f64 {
        self.click_through_rates
            .get(&thumbnail_type_key(scene_type, composition))
            .copied()
            .filter(|rate| rate.is_finite())
            .unwrap_or(0.0)
    }

    /// Variant the user holds in `experiment_id`, if any.
    pub fn variant_for(&self, experiment_id: &str) -> Option<&str> {
        self.active_experiment
            .as_ref()
            .filter(|a| a.experiment_id == experiment_id)
            .map(|a| a.variant.as_str())
    }

    /// Derive the profile that results from one engagement event.
    ///
    /// Click-through *rates* are not touched here: they are aggregated
    /// across requests by the engagement ledger and written back by the
    /// caller.
    pub fn with_feedback(&self, event: FeedbackEvent, scene_type: SceneType, composition: Composition) -> Self {
        let mut updated = self.clone();
        let key = thumbnail_type_key(scene_type, composition);

        match event {
            FeedbackEvent::Click => {
                updated.thumbnail_types_clicked.push(key);
            }
            FeedbackEvent::View { watch_time } => {
                if watch_time.is_finite() && watch_time > 0.0 {
                    *updated.watch_times.entry(key).or_insert(0.0) += watch_time;
                }
            }
            FeedbackEvent::Complete => {
                if !updated.preferred_scene_types.contains(&scene_type) {
                    updated.preferred_scene_types.push(scene_type);
                }
            }
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_rate_lookup() {
        let user = UserProfile::new("u1").with_click_rate("hero_closeup", 0.4);
        assert!((user.click_rate(SceneType::Hero, Composition::Closeup) - 0.4).abs() < 1e-9);
        assert_eq!(user.click_rate(SceneType::Duo, Composition::Duo), 0.0);
    }

    #[test]
    fn test_feedback_returns_new_profile() {
        let user = UserProfile::new("u1");
        let clicked = user.with_feedback(FeedbackEvent::Click, SceneType::Duo, Composition::Duo);
        let viewed = clicked.with_feedback(
            FeedbackEvent::View { watch_time: 30.0 },
            SceneType::Duo,
            Composition::Duo,
        );
        let viewed = viewed.with_feedback(
            FeedbackEvent::View { watch_time: 15.0 },
            SceneType::Duo,
            Composition::Duo,
        );
        let completed = viewed.with_feedback(FeedbackEvent::Complete, SceneType::Duo, Composition::Duo);

        assert!(user.thumbnail_types_clicked.is_empty());
        assert_eq!(clicked.thumbnail_types_clicked, vec!["duo_duo".to_string()]);
        assert!((viewed.watch_times["duo_duo"] - 45.0).abs() < 1e-9);
        assert_eq!(completed.preferred_scene_types, vec![SceneType::Duo]);

        let again = completed.with_feedback(FeedbackEvent::Complete, SceneType::Duo, Composition::Duo);
        assert_eq!(again.preferred_scene_types.len(), 1);
    }

    #[test]
    fn test_variant_for() {
        let user = UserProfile::new("u1")
            .with_assignment(ExperimentAssignment::new("exp", "variant_a"));
        assert_eq!(user.variant_for("exp"), Some("variant_a"));
        assert_eq!(user.variant_for("other"), None);
    }

    #[test]
    fn test_feedback_event_serde() {
        let event: FeedbackEvent =
            serde_json::from_str(r#"{"action": "view", "watch_time": 12.5}"#).unwrap();
        assert_eq!(event, FeedbackEvent::View { watch_time: 12.5 });
    }
}
