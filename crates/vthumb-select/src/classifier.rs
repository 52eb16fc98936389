//! Scene classification from frame feature descriptors.
//!
//! Turns the detector output for one frame into a [`SceneAnalysis`]:
//!
//! 1. Drop detections below the confidence threshold
//! 2. Bucket the rest into prominence tiers by frame coverage
//! 3. Derive composition and scene type from the prominent count
//! 4. Derive emotion/intensity from brightness, then override by subject count
//! 5. Combine subject count and pixel variance into an action level
//!
//! Classification is pure and never fails. Garbage statistics degrade to
//! neutral values rather than errors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use vthumb_models::{
    Composition, Emotion, FrameFeatures, Prominence, SceneAnalysis, SceneType, Setting,
};

/// Maximum action level.
pub const MAX_ACTION_LEVEL: u8 = 10;

/// Classifier tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Detections below this confidence are ignored (0-1).
    pub confidence_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

/// Anything that can turn frame features into a scene analysis.
///
/// The built-in [`SceneClassifier`] treats family-friendliness as a
/// pass-through policy hook. Callers that need real moderation plug in their
/// own analyzer here.
pub trait SceneAnalyzer: Send + Sync {
    fn analyze(&self, features: &FrameFeatures) -> SceneAnalysis;
}

/// Rule-based scene classifier.
#[derive(Debug, Clone, Default)]
pub struct SceneClassifier {
    config: ClassifierConfig,
}

impl SceneClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one frame.
    pub fn classify(&self, features: &FrameFeatures) -> SceneAnalysis {
        let tiers: Vec<Prominence> = features
            .subjects
            .iter()
            .filter(|s| s.confidence.is_finite() && s.confidence >= self.config.confidence_threshold)
            .map(|s| Prominence::from_coverage(finite_or(s.coverage_fraction, 0.0)))
            .collect();

        let subject_count = tiers.len();
        let prominent_count = tiers.iter().filter(|t| t.is_prominent()).count();
        let very_prominent_count = tiers
            .iter()
            .filter(|t| **t == Prominence::VeryProminent)
            .count();

        let (emotion, intensity) = emotion_for(features.brightness, subject_count);

        let analysis = SceneAnalysis {
            scene_type: scene_type_for(subject_count, prominent_count, very_prominent_count),
            composition: composition_for(subject_count, prominent_count),
            emotion,
            setting: setting_for(features.brightness),
            action_level: action_level_for(subject_count, features.variance),
            intensity,
            family_friendly: true,
            visual_interest: (finite_or(features.edge_density, 0.0) * 2.0).clamp(0.0, 1.0),
            color_saturation: finite_or(features.saturation, 0.0).clamp(0.0, 1.0),
            subject_count,
            prominent_count,
            very_prominent_count,
        };

        debug!(
            frame = features.frame_index,
            timestamp = features.timestamp,
            scene_type = %analysis.scene_type,
            composition = %analysis.composition,
            subjects = subject_count,
            "Classified frame"
        );

        analysis
    }
}

impl SceneAnalyzer for SceneClassifier {
    fn analyze(&self, features: &FrameFeatures) -> SceneAnalysis {
        self.classify(features)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Shot composition from subject counts.
fn composition_for(subject_count: usize, prominent_count: usize) -> Composition {
    if subject_count == 0 {
        return Composition::Establishing;
    }

    match prominent_count {
        0 => Composition::Wide,
        1 => Composition::Closeup,
        2 => Composition::Duo,
        _ => Composition::Ensemble,
    }
}

/// Scene type from the prominent-subject count; a lone subject is a hero
/// shot only when it is very prominent.
fn scene_type_for(subject_count: usize, prominent_count: usize, very_prominent_count: usize) -> SceneType {
    if subject_count == 0 {
        return SceneType::Establishing;
    }

    match prominent_count {
        0 => SceneType::Background,
        1 if very_prominent_count >= 1 => SceneType::Hero,
        1 => SceneType::CharacterFocus,
        2 => SceneType::Duo,
        3 => SceneType::Trio,
        _ => SceneType::Ensemble,
    }
}

/// Emotion and intensity. Brightness picks a base tag; subject count
/// overrides it and the later override wins.
fn emotion_for(brightness: f64, subject_count: usize) -> (Emotion, f64) {
    if subject_count == 0 {
        return (Emotion::Neutral, 0.5);
    }

    let (mut emotion, mut intensity) = if brightness > 220.0 {
        (Emotion::Uplifting, 0.8)
    } else if brightness > 180.0 {
        (Emotion::Happy, 0.6)
    } else if brightness < 80.0 {
        (Emotion::Tense, 0.9)
    } else if brightness < 120.0 {
        (Emotion::Dramatic, 0.7)
    } else {
        (Emotion::Neutral, 0.5)
    };

    if subject_count > 4 {
        (emotion, intensity) = (Emotion::Energetic, 0.8);
    } else if subject_count == 2 {
        (emotion, intensity) = (Emotion::Romantic, 0.6);
    } else if subject_count == 1 {
        (emotion, intensity) = (Emotion::Focused, 0.7);
    }

    (emotion, intensity)
}

fn setting_for(brightness: f64) -> Setting {
    if !brightness.is_finite() {
        Setting::Unknown
    } else if brightness > 150.0 {
        Setting::BrightIndoor
    } else if brightness > 100.0 {
        Setting::Outdoor
    } else {
        Setting::Indoor
    }
}

/// `min(2 * subjects, 6) + min(variance / 1000, 4)`, truncated.
fn action_level_for(subject_count: usize, variance: f64) -> u8 {
    if subject_count == 0 {
        return 0;
    }

    let base = (subject_count * 2).min(6) as f64;
    let variance = if variance.is_finite() { variance.max(0.0) } else { 0.0 };
    let boost = (variance / 1000.0).min(4.0);

    ((base + boost) as u8).min(MAX_ACTION_LEVEL)
}
