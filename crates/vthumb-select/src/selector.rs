//! Diversity-aware top-N selection.
//!
//! Candidates are partitioned into shot categories. Every scene type present
//! is shown once before any scene type repeats: categories are visited in
//! priority order taking their best candidate of a scene type not yet shown,
//! then scene types no category reached are added best first. Categories
//! skipped for that reason get their best candidate next. Remaining slots are
//! filled from the best unselected candidates overall, labelled
//! `diverse_shot_k`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vthumb_models::{Candidate, CandidateSet, Composition, Emotion, SceneAnalysis, SceneType};

use crate::metrics;

/// Action level above which an otherwise unassigned shot counts as action.
const ACTION_SHOT_LEVEL: u8 = 6;

/// Intensity above which an otherwise unassigned shot counts as emotional.
const EMOTIONAL_SHOT_INTENSITY: f64 = 0.7;

/// Prefix for fill picks.
pub const FILL_LABEL_PREFIX: &str = "diverse_shot";

/// Shot category used as a selection bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotCategory {
    HeroCloseup,
    EnsembleShot,
    ActionSequence,
    DuoInteraction,
    TrioScene,
    EmotionalMoment,
    DramaticScene,
    ComedicMoment,
    RomanticScene,
    WideEstablishing,
    Other,
}

impl ShotCategory {
    /// Default priority order.
    pub const ALL: &'static [ShotCategory] = &[
        ShotCategory::HeroCloseup,
        ShotCategory::EnsembleShot,
        ShotCategory::ActionSequence,
        ShotCategory::DuoInteraction,
        ShotCategory::TrioScene,
        ShotCategory::EmotionalMoment,
        ShotCategory::DramaticScene,
        ShotCategory::ComedicMoment,
        ShotCategory::RomanticScene,
        ShotCategory::WideEstablishing,
        ShotCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeroCloseup => "hero_closeup",
            Self::EnsembleShot => "ensemble_shot",
            Self::ActionSequence => "action_sequence",
            Self::DuoInteraction => "duo_interaction",
            Self::TrioScene => "trio_scene",
            Self::EmotionalMoment => "emotional_moment",
            Self::DramaticScene => "dramatic_scene",
            Self::ComedicMoment => "comedic_moment",
            Self::RomanticScene => "romantic_scene",
            Self::WideEstablishing => "wide_establishing",
            Self::Other => "other",
        }
    }

    /// Category of a scene. Each scene belongs to exactly one category.
    ///
    /// Scene types with a dedicated category win. Background and unknown
    /// scenes fall back to composition, action level and emotion.
    pub fn of(scene: &SceneAnalysis) -> Self {
        match scene.scene_type {
            SceneType::Hero | SceneType::CharacterFocus => return Self::HeroCloseup,
            SceneType::Ensemble => return Self::EnsembleShot,
            SceneType::Duo => return Self::DuoInteraction,
            SceneType::Trio => return Self::TrioScene,
            SceneType::Establishing => return Self::WideEstablishing,
            SceneType::Background | SceneType::Unknown => {}
        }

        if scene.composition == Composition::Closeup {
            return Self::HeroCloseup;
        }
        if scene.action_level > ACTION_SHOT_LEVEL {
            return Self::ActionSequence;
        }
        match scene.composition {
            Composition::Ensemble => return Self::EnsembleShot,
            Composition::Duo => return Self::DuoInteraction,
            _ => {}
        }
        match scene.emotion {
            Emotion::Tense | Emotion::Dramatic => return Self::DramaticScene,
            Emotion::Uplifting | Emotion::Happy => return Self::ComedicMoment,
            Emotion::Romantic => return Self::RomanticScene,
            _ => {}
        }
        if scene.intensity > EMOTIONAL_SHOT_INTENSITY {
            return Self::EmotionalMoment;
        }
        match scene.composition {
            Composition::Wide | Composition::Establishing => Self::WideEstablishing,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ShotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Selector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Categories visited in the coverage pass, highest priority first.
    /// Candidates in categories left out are still picked to cover their
    /// scene type, labelled by scene type.
    pub bucket_order: Vec<ShotCategory>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            bucket_order: ShotCategory::ALL.to_vec(),
        }
    }
}

/// One selected thumbnail with the label it was picked under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedThumbnail {
    pub candidate: Candidate,
    pub label: String,

    /// Bucket the candidate was picked from; `None` for fill picks and for
    /// scene-type picks whose bucket is already used
    pub category: Option<ShotCategory>,
}

/// Diversity selector.
#[derive(Debug, Clone, Default)]
pub struct DiversitySelector {
    config: SelectorConfig,
}

impl DiversitySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Pick up to `count` candidates, one per category first.
    ///
    /// Returns `min(count, candidates.len())` entries, never the same
    /// candidate twice. Empty input yields an empty list.
    pub fn select(&self, candidates: &CandidateSet, count: usize) -> Vec<SelectedThumbnail> {
        if count == 0 || candidates.is_empty() {
            return Vec::new();
        }

        let pool = candidates.as_slice();
        let mut buckets: BTreeMap<ShotCategory, Vec<usize>> = BTreeMap::new();
        for (idx, candidate) in pool.iter().enumerate() {
            buckets
                .entry(ShotCategory::of(&candidate.scene))
                .or_default()
                .push(idx);
        }
        for members in buckets.values_mut() {
            members.sort_by(|&a, &b| pool[a].rank_cmp(&pool[b]));
        }

        let mut taken: HashSet<usize> = HashSet::with_capacity(count);
        let mut types_seen: HashSet<SceneType> = HashSet::new();
        let mut categories_used: HashSet<ShotCategory> = HashSet::new();
        let mut selected = Vec::with_capacity(count.min(pool.len()));

        // Buckets in priority order, each taking its best scene type not yet shown.
        for category in &self.config.bucket_order {
            if selected.len() >= count {
                break;
            }
            let Some(members) = buckets.get(category) else {
                continue;
            };
            let pick = members
                .iter()
                .find(|idx| !taken.contains(*idx) && !types_seen.contains(&pool[**idx].scene.scene_type));
            if let Some(&best) = pick {
                debug!(
                    category = %category,
                    timestamp = pool[best].timestamp,
                    score = pool[best].score,
                    "Bucket pick"
                );
                taken.insert(best);
                types_seen.insert(pool[best].scene.scene_type);
                categories_used.insert(*category);
                selected.push(SelectedThumbnail {
                    candidate: pool[best].clone(),
                    label: category.as_str().to_string(),
                    category: Some(*category),
                });
            }
        }

        // Scene types no bucket reached, best first.
        let mut best_of_type: BTreeMap<SceneType, usize> = BTreeMap::new();
        for (idx, candidate) in pool.iter().enumerate() {
            let scene_type = candidate.scene.scene_type;
            if taken.contains(&idx) || types_seen.contains(&scene_type) {
                continue;
            }
            best_of_type
                .entry(scene_type)
                .and_modify(|best| {
                    if candidate.rank_cmp(&pool[*best]).is_lt() {
                        *best = idx;
                    }
                })
                .or_insert(idx);
        }
        let mut uncovered: Vec<usize> = best_of_type.into_values().collect();
        uncovered.sort_by(|&a, &b| pool[a].rank_cmp(&pool[b]));
        for idx in uncovered {
            if selected.len() >= count {
                break;
            }
            let category = ShotCategory::of(&pool[idx].scene);
            let named = self.config.bucket_order.contains(&category) && categories_used.insert(category);
            taken.insert(idx);
            types_seen.insert(pool[idx].scene.scene_type);
            selected.push(SelectedThumbnail {
                candidate: pool[idx].clone(),
                label: if named {
                    category.as_str().to_string()
                } else {
                    pool[idx].scene.scene_type.as_str().to_string()
                },
                category: named.then_some(category),
            });
        }

        // Buckets skipped above because their scene types were already shown.
        for category in &self.config.bucket_order {
            if selected.len() >= count {
                break;
            }
            if categories_used.contains(category) {
                continue;
            }
            let Some(members) = buckets.get(category) else {
                continue;
            };
            if let Some(&best) = members.iter().find(|idx| !taken.contains(*idx)) {
                taken.insert(best);
                categories_used.insert(*category);
                selected.push(SelectedThumbnail {
                    candidate: pool[best].clone(),
                    label: category.as_str().to_string(),
                    category: Some(*category),
                });
            }
        }

        let covered = selected.len();
        let mut remaining: Vec<usize> = (0..pool.len()).filter(|i| !taken.contains(i)).collect();
        remaining.sort_by(|&a, &b| pool[a].rank_cmp(&pool[b]));

        for (k, idx) in remaining
            .into_iter()
            .take(count.saturating_sub(covered))
            .enumerate()
        {
            selected.push(SelectedThumbnail {
                candidate: pool[idx].clone(),
                label: format!("{}_{}", FILL_LABEL_PREFIX, k + 1),
                category: None,
            });
        }

        let filled = selected.len() - covered;
        metrics::record_selection(selected.len(), filled);
        info!(
            requested = count,
            available = pool.len(),
            buckets = buckets.len(),
            covered,
            filled,
            "Selected thumbnails"
        );

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vthumb_models::{FrameRef, ProfileId};

    fn scene(scene_type: SceneType, composition: Composition) -> SceneAnalysis {
        SceneAnalysis {
            scene_type,
            composition,
            ..SceneAnalysis::default()
        }
    }

    fn candidate(ts: f64, score: f64, scene: SceneAnalysis) -> Candidate {
        Candidate::new(FrameRef::new(ts as u64, ts), ProfileId::from("p"), scene, score)
    }

    #[test]
    fn test_category_by_scene_type() {
        assert_eq!(ShotCategory::of(&scene(SceneType::Hero, Composition::Closeup)), ShotCategory::HeroCloseup);
        assert_eq!(
            ShotCategory::of(&scene(SceneType::CharacterFocus, Composition::Closeup)),
            ShotCategory::HeroCloseup
        );
        assert_eq!(ShotCategory::of(&scene(SceneType::Ensemble, Composition::Ensemble)), ShotCategory::EnsembleShot);
        assert_eq!(ShotCategory::of(&scene(SceneType::Duo, Composition::Duo)), ShotCategory::DuoInteraction);
        assert_eq!(ShotCategory::of(&scene(SceneType::Trio, Composition::Ensemble)), ShotCategory::TrioScene);
        assert_eq!(
            ShotCategory::of(&scene(SceneType::Establishing, Composition::Establishing)),
            ShotCategory::WideEstablishing
        );
    }

    #[test]
    fn test_category_fallbacks_for_background() {
        let mut bg = scene(SceneType::Background, Composition::Wide);
        assert_eq!(ShotCategory::of(&bg), ShotCategory::WideEstablishing);

        bg.emotion = Emotion::Tense;
        assert_eq!(ShotCategory::of(&bg), ShotCategory::DramaticScene);

        bg.action_level = 8;
        assert_eq!(ShotCategory::of(&bg), ShotCategory::ActionSequence);

        let mut calm = scene(SceneType::Unknown, Composition::Mid);
        calm.intensity = 0.9;
        assert_eq!(ShotCategory::of(&calm), ShotCategory::EmotionalMoment);
        calm.intensity = 0.1;
        assert_eq!(ShotCategory::of(&calm), ShotCategory::Other);
    }

    #[test]
    fn test_best_of_each_bucket_in_priority_order() {
        let set: CandidateSet = vec![
            candidate(1.0, 5.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(2.0, 9.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(3.0, 1.0, scene(SceneType::Hero, Composition::Closeup)),
            candidate(4.0, 3.0, scene(SceneType::Ensemble, Composition::Ensemble)),
        ]
        .into_iter()
        .collect();

        let picks = DiversitySelector::default().select(&set, 3);
        let got: Vec<(&str, f64)> = picks.iter().map(|p| (p.label.as_str(), p.candidate.timestamp)).collect();
        assert_eq!(
            got,
            vec![("hero_closeup", 3.0), ("ensemble_shot", 4.0), ("duo_interaction", 2.0)]
        );
    }

    #[test]
    fn test_bucket_tie_breaks_on_earliest_timestamp() {
        let set: CandidateSet = vec![
            candidate(7.0, 2.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(3.0, 2.0, scene(SceneType::Duo, Composition::Duo)),
        ]
        .into_iter()
        .collect();

        let picks = DiversitySelector::default().select(&set, 1);
        assert_eq!(picks[0].candidate.timestamp, 3.0);
    }

    #[test]
    fn test_fill_uses_global_score_order() {
        let set: CandidateSet = vec![
            candidate(1.0, 1.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(2.0, 4.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(3.0, 3.0, scene(SceneType::Duo, Composition::Duo)),
            candidate(4.0, 2.0, scene(SceneType::Hero, Composition::Closeup)),
        ]
        .into_iter()
        .collect();

        let picks = DiversitySelector::default().select(&set, 4);
        let labels: Vec<&str> = picks.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["hero_closeup", "duo_interaction", "diverse_shot_1", "diverse_shot_2"]
        );
        assert_eq!(picks[2].candidate.timestamp, 3.0);
        assert_eq!(picks[3].candidate.timestamp, 1.0);
        assert!(picks[2].category.is_none());
    }

    #[test]
    fn test_count_larger_than_pool_returns_everything_once() {
        let set: CandidateSet = (0..5)
            .map(|i| candidate(i as f64, 1.0, scene(SceneType::Duo, Composition::Duo)))
            .collect();

        let picks = DiversitySelector::default().select(&set, 50);
        assert_eq!(picks.len(), 5);
        let unique: HashSet<u64> = picks.iter().map(|p| p.candidate.timestamp.to_bits()).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_empty_and_zero_count() {
        let selector = DiversitySelector::default();
        assert!(selector.select(&CandidateSet::new(), 3).is_empty());

        let set: CandidateSet = vec![candidate(1.0, 1.0, scene(SceneType::Duo, Composition::Duo))]
            .into_iter()
            .collect();
        assert!(selector.select(&set, 0).is_empty());
    }

    #[test]
    fn test_custom_bucket_order() {
        let selector = DiversitySelector::new(SelectorConfig {
            bucket_order: vec![ShotCategory::DuoInteraction],
        });
        let set: CandidateSet = vec![
            candidate(1.0, 9.0, scene(SceneType::Hero, Composition::Closeup)),
            candidate(2.0, 1.0, scene(SceneType::Duo, Composition::Duo)),
        ]
        .into_iter()
        .collect();

        let picks = selector.select(&set, 2);
        assert_eq!(picks[0].label, "duo_interaction");
        assert_eq!(picks[1].label, "hero");
        assert_eq!(picks[1].category, None);
        assert_eq!(picks[1].candidate.timestamp, 1.0);
    }

    #[test]
    fn test_hero_and_character_focus_both_shown_before_repeats() {
        let mut pool = Vec::new();
        let mut ts = 0.0;
        for (scene_type, composition, base) in [
            (SceneType::Hero, Composition::Closeup, 9.0),
            (SceneType::CharacterFocus, Composition::Closeup, 1.0),
            (SceneType::Ensemble, Composition::Ensemble, 7.0),
            (SceneType::Duo, Composition::Duo, 6.0),
            (SceneType::Trio, Composition::Ensemble, 5.0),
            (SceneType::Establishing, Composition::Establishing, 4.0),
        ] {
            let copies = if scene_type == SceneType::Hero { 4 } else { 2 };
            for k in 0..copies {
                ts += 1.0;
                pool.push(candidate(ts, base - 0.1 * k as f64, scene(scene_type, composition)));
            }
        }
        let set: CandidateSet = pool.into_iter().collect();
        assert_eq!(set.len(), 14);

        let picks = DiversitySelector::default().select(&set, 10);
        assert_eq!(picks.len(), 10);

        let first_six: HashSet<SceneType> = picks[..6].iter().map(|p| p.candidate.scene.scene_type).collect();
        assert_eq!(first_six.len(), 6);
        assert_eq!(picks[5].candidate.scene.scene_type, SceneType::CharacterFocus);
        assert_eq!(picks[5].label, "character_focus");
        assert!(picks[6..].iter().all(|p| p.label.starts_with("diverse_shot_")));
    }

    #[test]
    fn test_bucket_skips_scene_type_already_shown() {
        let mut action = scene(SceneType::Background, Composition::Wide);
        action.action_level = 9;
        let mut drama = scene(SceneType::Background, Composition::Wide);
        drama.emotion = Emotion::Tense;
        let set: CandidateSet = vec![
            candidate(1.0, 9.0, action),
            candidate(2.0, 8.0, drama),
            candidate(3.0, 1.0, scene(SceneType::Duo, Composition::Duo)),
        ]
        .into_iter()
        .collect();

        let picks = DiversitySelector::default().select(&set, 3);
        let labels: Vec<&str> = picks.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["action_sequence", "duo_interaction", "dramatic_scene"]);
    }
}
