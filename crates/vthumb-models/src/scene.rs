//! Scene analysis categories.
//!
//! Every category is a closed enum with a stable snake_case string form used
//! for serialization, preference matching and boost rules. Unrecognised
//! strings deserialize to the `Unknown` variant instead of failing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Scene type derived from the prominent subject count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    /// No subjects detected
    Establishing,
    /// Subjects present but none prominent
    Background,
    /// One prominent subject
    CharacterFocus,
    /// One very prominent subject
    Hero,
    Duo,
    Trio,
    /// Four or more prominent subjects
    Ensemble,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SceneType {
    pub const ALL: &'static [SceneType] = &[
        SceneType::Establishing,
        SceneType::Background,
        SceneType::CharacterFocus,
        SceneType::Hero,
        SceneType::Duo,
        SceneType::Trio,
        SceneType::Ensemble,
        SceneType::Unknown,
    ];

    /// Returns the scene type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Establishing => "establishing",
            Self::Background => "background",
            Self::CharacterFocus => "character_focus",
            Self::Hero => "hero",
            Self::Duo => "duo",
            Self::Trio => "trio",
            Self::Ensemble => "ensemble",
            Self::Unknown => "unknown",
        }
    }
}

/// Shot composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    Closeup,
    Mid,
    Wide,
    Duo,
    Ensemble,
    Establishing,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Composition {
    pub const ALL: &'static [Composition] = &[
        Composition::Closeup,
        Composition::Mid,
        Composition::Wide,
        Composition::Duo,
        Composition::Ensemble,
        Composition::Establishing,
        Composition::Unknown,
    ];

    /// Returns the composition as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closeup => "closeup",
            Self::Mid => "mid",
            Self::Wide => "wide",
            Self::Duo => "duo",
            Self::Ensemble => "ensemble",
            Self::Establishing => "establishing",
            Self::Unknown => "unknown",
        }
    }
}

/// Emotion tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Uplifting,
    Happy,
    Tense,
    Dramatic,
    #[default]
    Neutral,
    Energetic,
    Romantic,
    Focused,
    #[serde(other)]
    Unknown,
}

impl Emotion {
    pub const ALL: &'static [Emotion] = &[
        Emotion::Uplifting,
        Emotion::Happy,
        Emotion::Tense,
        Emotion::Dramatic,
        Emotion::Neutral,
        Emotion::Energetic,
        Emotion::Romantic,
        Emotion::Focused,
        Emotion::Unknown,
    ];

    /// Returns the emotion as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uplifting => "uplifting",
            Self::Happy => "happy",
            Self::Tense => "tense",
            Self::Dramatic => "dramatic",
            Self::Neutral => "neutral",
            Self::Energetic => "energetic",
            Self::Romantic => "romantic",
            Self::Focused => "focused",
            Self::Unknown => "unknown",
        }
    }
}

/// How much of the frame a subject occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Prominence {
    Background,
    Moderate,
    Prominent,
    VeryProminent,
}

impl Prominence {
    pub const ALL: &'static [Prominence] = &[
        Prominence::Background,
        Prominence::Moderate,
        Prominence::Prominent,
        Prominence::VeryProminent,
    ];

    /// Tier for a coverage fraction (bbox area / frame area).
    pub fn from_coverage(coverage: f64) -> Self {
        if coverage > 0.30 {
            Self::VeryProminent
        } else if coverage > 0.15 {
            Self::Prominent
        } else if coverage > 0.05 {
            Self::Moderate
        } else {
            Self::Background
        }
    }

    /// Returns true for the two upper tiers.
    pub fn is_prominent(&self) -> bool {
        matches!(self, Self::Prominent | Self::VeryProminent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Moderate => "moderate",
            Self::Prominent => "prominent",
            Self::VeryProminent => "very_prominent",
        }
    }
}

/// Coarse setting inferred from frame brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    BrightIndoor,
    Outdoor,
    Indoor,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Setting {
    pub const ALL: &'static [Setting] = &[
        Setting::BrightIndoor,
        Setting::Outdoor,
        Setting::Indoor,
        Setting::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrightIndoor => "bright_indoor",
            Self::Outdoor => "outdoor",
            Self::Indoor => "indoor",
            Self::Unknown => "unknown",
        }
    }
}

macro_rules! impl_display_from_str {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_lowercase();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == needle)
                    .ok_or_else(|| ModelError::unknown($kind, s))
            }
        }
    };
}

impl_display_from_str!(SceneType, "scene type");
impl_display_from_str!(Composition, "composition");
impl_display_from_str!(Emotion, "emotion");
impl_display_from_str!(Prominence, "prominence");
impl_display_from_str!(Setting, "setting");

/// Classification result for one frame.
///
/// Immutable once produced; every later stage reads it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneAnalysis {
    pub scene_type: SceneType,
    pub composition: Composition,
    pub emotion: Emotion,
    #[serde(default)]
    pub setting: Setting,

    /// Action intensity (0-10)
    pub action_level: u8,

    /// Emotional intensity (0-1)
    pub intensity: f64,

    /// Content-policy hook; always true for the built-in classifier
    pub family_friendly: bool,

    /// Edge-density based interest (0-1)
    pub visual_interest: f64,

    /// Mean saturation (0-1)
    pub color_saturation: f64,

    /// Subjects above the detection confidence threshold
    pub subject_count: usize,

    /// Subjects in the prominent or very prominent tier
    #[serde(default)]
    pub prominent_count: usize,

    /// Subjects in the very prominent tier
    #[serde(default)]
    pub very_prominent_count: usize,
}

impl Default for SceneAnalysis {
    fn default() -> Self {
        Self {
            scene_type: SceneType::Unknown,
            composition: Composition::Unknown,
            emotion: Emotion::Neutral,
            setting: Setting::Unknown,
            action_level: 0,
            intensity: 0.0,
            family_friendly: true,
            visual_interest: 0.0,
            color_saturation: 0.0,
            subject_count: 0,
            prominent_count: 0,
            very_prominent_count: 0,
        }
    }
}

impl SceneAnalysis {
    /// Key used for per-type engagement statistics, e.g. `hero_closeup`.
    pub fn thumbnail_type(&self) -> String {
        thumbnail_type_key(self.scene_type, self.composition)
    }

    /// Short human-readable description.
    pub fn description(&self) -> String {
        format!("{} with {} characters", self.scene_type, self.subject_count)
    }
}

/// Engagement key for a (scene type, composition) pair.
pub fn thumbnail_type_key(scene_type: SceneType, composition: Composition) -> String {
    format!("{}_{}", scene_type.as_str(), composition.as_str())
}
