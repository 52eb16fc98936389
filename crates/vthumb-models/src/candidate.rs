//! Scored thumbnail candidates.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::frame::FrameRef;
use crate::scene::SceneAnalysis;

/// Identifier of a scoring profile, used as the candidate's source tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which stage produced a candidate's current score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Score straight from a scoring profile
    #[default]
    Scored,
    /// Re-scored by the personalization reranker
    Personalized,
    /// Re-scored by an experiment boost rule
    ExperimentBoosted,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scored => "scored",
            Self::Personalized => "personalized",
            Self::ExperimentBoosted => "experiment_boosted",
        }
    }
}

/// One scored, timestamped thumbnail proposal from one scoring source.
///
/// Candidates are never mutated after creation. Re-scoring stages call
/// [`Candidate::rescored`], which returns a new value and keeps the
/// original scorer output in `base_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    /// Index of the source frame
    pub frame_index: u64,

    /// Frame timestamp in seconds
    pub timestamp: f64,

    /// Scoring profile that produced this candidate
    pub source: ProfileId,

    /// Scene analysis the score was computed from
    pub scene: SceneAnalysis,

    /// Current score (>= 0)
    pub score: f64,

    /// Score assigned by the scoring profile, unchanged by re-scoring
    pub base_score: f64,

    /// 1 / (1 + earlier accepted candidates of the same scene type) within the source
    #[serde(default = "default_diversity_factor")]
    pub diversity_factor: f64,

    /// Whether the scene type suits the content genres
    #[serde(default = "default_genre_aligned")]
    pub genre_aligned: bool,

    #[serde(default)]
    pub provenance: Provenance,
}

fn default_diversity_factor() -> f64 {
    1.0
}

fn default_genre_aligned() -> bool {
    true
}

impl Candidate {
    /// Create a freshly scored candidate.
    pub fn new(frame: FrameRef, source: ProfileId, scene: SceneAnalysis, score: f64) -> Self {
        let score = sanitize_score(score);
        Self {
            frame_index: frame.frame_index,
            timestamp: frame.timestamp,
            source,
            scene,
            score,
            base_score: score,
            diversity_factor: 1.0,
            genre_aligned: true,
            provenance: Provenance::Scored,
        }
    }

    /// Set the diversity factor.
    pub fn with_diversity_factor(mut self, factor: f64) -> Self {
        self.diversity_factor = factor;
        self
    }

    /// Set the genre alignment flag.
    pub fn with_genre_aligned(mut self, aligned: bool) -> Self {
        self.genre_aligned = aligned;
        self
    }

    /// Produce a re-scored copy tagged with the stage that changed it.
    pub fn rescored(&self, score: f64, provenance: Provenance) -> Self {
        Self {
            score: sanitize_score(score),
            provenance,
            ..self.clone()
        }
    }

    /// Handle to the source frame.
    pub fn frame_ref(&self) -> FrameRef {
        FrameRef::new(self.frame_index, self.timestamp)
    }

    /// Identity of a candidate: (timestamp, source).
    pub fn same_identity(&self, other: &Candidate) -> bool {
        self.timestamp.to_bits() == other.timestamp.to_bits() && self.source == other.source
    }

    /// Descending score order, earliest timestamp first on ties.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.timestamp.total_cmp(&other.timestamp))
    }
}

fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() {
        score.max(0.0)
    } else {
        0.0
    }
}

/// Ordered sequence of candidates, unique by (timestamp, source).
///
/// Deserializes from a plain list through [`CandidateSet::from_candidates`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, keeping the first occurrence of each (timestamp, source).
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let mut seen: HashSet<(u64, ProfileId)> = HashSet::with_capacity(candidates.len());
        let candidates = candidates
            .into_iter()
            .filter(|c| seen.insert((c.timestamp.to_bits(), c.source.clone())))
            .collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }

    /// Return a copy sorted by descending score.
    ///
    /// The sort is stable: equal scores keep their current relative order.
    pub fn sorted_by_score(&self) -> Self {
        let mut candidates = self.candidates.clone();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { candidates }
    }

    /// Distinct sources present, in first-seen order.
    pub fn sources(&self) -> Vec<ProfileId> {
        let mut sources: Vec<ProfileId> = Vec::new();
        for candidate in &self.candidates {
            if !sources.contains(&candidate.source) {
                sources.push(candidate.source.clone());
            }
        }
        sources
    }
}

impl<'de> Deserialize<'de> for CandidateSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Candidate>::deserialize(deserializer).map(Self::from_candidates)
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        Self::from_candidates(iter.into_iter().collect())
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}
