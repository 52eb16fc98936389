//! Per-user reranking.
//!
//! Adds independent, additive bonuses to each candidate's current score and
//! re-sorts with a stable sort, so equal adjusted scores keep their prior
//! relative order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vthumb_models::{Candidate, CandidateSet, Provenance, UserProfile};

/// Bonus weights. Each bonus is `weight * scale * match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizationWeights {
    pub genre_weight: f64,
    pub genre_scale: f64,
    pub scene_type_weight: f64,
    pub scene_type_bonus: f64,
    pub composition_weight: f64,
    pub composition_bonus: f64,
    pub emotion_weight: f64,
    pub emotion_bonus: f64,
    pub click_rate_weight: f64,
    pub click_rate_scale: f64,
}

impl Default for PersonalizationWeights {
    fn default() -> Self {
        Self {
            genre_weight: 0.3,
            genre_scale: 2.0,
            scene_type_weight: 0.25,
            scene_type_bonus: 1.5,
            composition_weight: 0.2,
            composition_bonus: 1.0,
            emotion_weight: 0.15,
            emotion_bonus: 1.0,
            click_rate_weight: 0.1,
            click_rate_scale: 2.0,
        }
    }
}

/// Reranks a candidate set for one user and one piece of content.
#[derive(Debug, Clone)]
pub struct PersonalizationReranker {
    content_genres: Vec<String>,
    weights: PersonalizationWeights,
}

impl PersonalizationReranker {
    pub fn new(content_genres: Vec<String>) -> Self {
        Self {
            content_genres,
            weights: PersonalizationWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: PersonalizationWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Fraction of content genres the user prefers (case-insensitive).
    pub fn genre_overlap(&self, user: &UserProfile) -> f64 {
        let content: HashSet<String> = self
            .content_genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();
        if content.is_empty() {
            return 0.0;
        }
        let preferred: HashSet<String> = user
            .preferred_genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .collect();

        content.intersection(&preferred).count() as f64 / content.len() as f64
    }

    /// Total bonus for one candidate.
    pub fn adjustment(&self, candidate: &Candidate, user: &UserProfile, genre_overlap: f64) -> f64 {
        let w = &self.weights;
        let scene = &candidate.scene;

        let mut bonus = genre_overlap * w.genre_weight * w.genre_scale;
        if user.preferred_scene_types.contains(&scene.scene_type) {
            bonus += w.scene_type_weight * w.scene_type_bonus;
        }
        if user.composition_preferences.contains(&scene.composition) {
            bonus += w.composition_weight * w.composition_bonus;
        }
        if user.emotion_preferences.contains(&scene.emotion) {
            bonus += w.emotion_weight * w.emotion_bonus;
        }
        bonus += user.click_rate(scene.scene_type, scene.composition) * w.click_rate_weight * w.click_rate_scale;

        if bonus.is_finite() {
            bonus
        } else {
            0.0
        }
    }

    /// Re-score and stably re-sort. Membership is unchanged.
    pub fn rerank(&self, candidates: &CandidateSet, user: &UserProfile) -> CandidateSet {
        let overlap = self.genre_overlap(user);
        let mut reranked: Vec<Candidate> = candidates
            .iter()
            .map(|c| c.rescored(c.score + self.adjustment(c, user, overlap), Provenance::Personalized))
            .collect();
        reranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            user_id = %user.user_id,
            candidates = reranked.len(),
            genre_overlap = overlap,
            "Personalized candidate ranking"
        );
        CandidateSet::from_candidates(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vthumb_models::{Composition, Emotion, FrameRef, ProfileId, SceneAnalysis, SceneType};

    fn candidate(ts: f64, score: f64, scene_type: SceneType, composition: Composition) -> Candidate {
        let scene = SceneAnalysis {
            scene_type,
            composition,
            ..SceneAnalysis::default()
        };
        Candidate::new(FrameRef::new(ts as u64, ts), ProfileId::from("p"), scene, score)
    }

    #[test]
    fn test_bonuses_are_additive() {
        let user = UserProfile::new("u")
            .with_genres(["animation", "comedy"])
            .with_scene_types(vec![SceneType::Duo])
            .with_compositions(vec![Composition::Duo])
            .with_emotions(vec![Emotion::Neutral])
            .with_click_rate("duo_duo", 0.5);
        let reranker = PersonalizationReranker::new(vec!["Animation".into(), "Family".into()]);

        let c = candidate(1.0, 1.0, SceneType::Duo, Composition::Duo);
        let overlap = reranker.genre_overlap(&user);
        assert!((overlap - 0.5).abs() < 1e-9);

        // 0.5*0.6 + 0.375 + 0.2 + 0.15 + 0.5*0.2
        let expected = 0.3 + 0.375 + 0.2 + 0.15 + 0.1;
        assert!((reranker.adjustment(&c, &user, overlap) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rerank_promotes_preferred_scene() {
        let user = UserProfile::new("u").with_scene_types(vec![SceneType::Ensemble]);
        let set: CandidateSet = vec![
            candidate(1.0, 1.0, SceneType::Hero, Composition::Closeup),
            candidate(2.0, 0.8, SceneType::Ensemble, Composition::Ensemble),
        ]
        .into_iter()
        .collect();

        let reranked = PersonalizationReranker::new(vec![]).rerank(&set, &user);
        let first = &reranked.as_slice()[0];
        assert_eq!(first.timestamp, 2.0);
        assert_eq!(first.provenance, Provenance::Personalized);
        assert_eq!(first.base_score, 0.8);
        assert_eq!(reranked.len(), set.len());
    }

    #[test]
    fn test_rerank_is_stable_for_ties() {
        let user = UserProfile::new("u");
        let set: CandidateSet = vec![
            candidate(5.0, 1.0, SceneType::Duo, Composition::Duo),
            candidate(1.0, 1.0, SceneType::Duo, Composition::Duo),
            candidate(3.0, 1.0, SceneType::Duo, Composition::Duo),
        ]
        .into_iter()
        .collect();

        let reranked = PersonalizationReranker::new(vec!["drama".into()]).rerank(&set, &user);
        let order: Vec<f64> = reranked.iter().map(|c| c.timestamp).collect();
        assert_eq!(order, vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn test_no_content_genres_means_no_genre_bonus() {
        let user = UserProfile::new("u").with_genres(["drama"]);
        assert_eq!(PersonalizationReranker::new(vec![]).genre_overlap(&user), 0.0);
    }
}
