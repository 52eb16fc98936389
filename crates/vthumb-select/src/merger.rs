//! Multi-source candidate merging.
//!
//! Sources are walked in an explicit priority order. The first non-empty
//! source is accepted whole (minus exact duplicates). A candidate from any
//! later source is dropped when an already-accepted candidate lies strictly
//! within `proximity_seconds` of it. The dedup is greedy: a better-scoring
//! candidate from a lower-priority source can lose to an earlier one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vthumb_models::{Candidate, CandidateSet, ProfileId};

use crate::error::{SelectError, SelectResult};
use crate::metrics;
use crate::profile::{CHARACTER_PROFILE, QUALITY_PROFILE};

/// Default dedup window in seconds.
pub const DEFAULT_PROXIMITY_SECONDS: f64 = 2.0;

/// Merge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Source ids, highest priority first
    pub source_priority: Vec<ProfileId>,

    /// Later-source candidates closer than this to an accepted one are dropped
    pub proximity_seconds: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            source_priority: vec![
                ProfileId::from(QUALITY_PROFILE),
                ProfileId::from(CHARACTER_PROFILE),
            ],
            proximity_seconds: DEFAULT_PROXIMITY_SECONDS,
        }
    }
}

impl MergeConfig {
    pub fn new(source_priority: Vec<ProfileId>) -> Self {
        Self {
            source_priority,
            ..Self::default()
        }
    }

    pub fn with_proximity(mut self, seconds: f64) -> Self {
        self.proximity_seconds = seconds;
        self
    }

    pub fn validate(&self) -> SelectResult<()> {
        if self.source_priority.is_empty() {
            return Err(SelectError::configuration("source priority order is empty"));
        }
        validate_proximity(self.proximity_seconds)?;

        let mut seen = HashSet::new();
        if let Some(dup) = self.source_priority.iter().find(|id| !seen.insert(*id)) {
            return Err(SelectError::configuration(format!(
                "source {} listed twice in priority order",
                dup
            )));
        }
        Ok(())
    }

    /// Position of a source in the priority order.
    pub fn rank_of(&self, source: &ProfileId) -> SelectResult<usize> {
        self.source_priority
            .iter()
            .position(|id| id == source)
            .ok_or_else(|| SelectError::unknown_profile(source.as_str()))
    }
}

fn validate_proximity(seconds: f64) -> SelectResult<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SelectError::configuration(format!(
            "proximity window must be a non-negative number of seconds, got {}",
            seconds
        )));
    }
    Ok(())
}

/// Merge lists that are already in priority order.
pub fn merge_candidates(lists: &[CandidateSet], proximity_seconds: f64) -> SelectResult<CandidateSet> {
    validate_proximity(proximity_seconds)?;
    if lists.iter().all(CandidateSet::is_empty) {
        return Err(SelectError::EmptyInput {
            sources: lists.len(),
        });
    }

    let mut accepted: Vec<Candidate> = Vec::new();
    let mut anchor_taken = false;

    for list in lists.iter().filter(|l| !l.is_empty()) {
        let mut dropped = 0usize;
        for candidate in list {
            let duplicate = accepted.iter().any(|c| c.same_identity(candidate));
            let too_close = anchor_taken
                && accepted
                    .iter()
                    .any(|c| (c.timestamp - candidate.timestamp).abs() < proximity_seconds);

            if duplicate || too_close {
                dropped += 1;
                continue;
            }
            accepted.push(candidate.clone());
        }

        let source = list
            .as_slice()
            .first()
            .map(|c| c.source.as_str())
            .unwrap_or_default();
        metrics::record_deduplicated(source, dropped);
        debug!(source = %source, kept = list.len() - dropped, dropped, "Merged source");
        anchor_taken = true;
    }

    Ok(CandidateSet::from_candidates(accepted))
}

/// Merges per-profile candidate sets by configured source priority.
#[derive(Debug, Clone)]
pub struct SourceMerger {
    config: MergeConfig,
}

impl SourceMerger {
    pub fn new(config: MergeConfig) -> SelectResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Order the lists by source priority, then merge.
    ///
    /// Each non-empty list must hold candidates from exactly one source that
    /// appears in the priority order.
    pub fn merge(&self, lists: &[CandidateSet]) -> SelectResult<CandidateSet> {
        let mut ranked: Vec<(usize, &CandidateSet)> = Vec::with_capacity(lists.len());
        for list in lists.iter().filter(|l| !l.is_empty()) {
            let sources = list.sources();
            let [source] = sources.as_slice() else {
                return Err(SelectError::invalid_input(format!(
                    "candidate list mixes sources: {}",
                    sources
                        .iter()
                        .map(ProfileId::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            };
            ranked.push((self.config.rank_of(source)?, list));
        }
        ranked.sort_by_key(|(rank, _)| *rank);

        if ranked.is_empty() {
            return Err(SelectError::EmptyInput {
                sources: lists.len(),
            });
        }

        let ordered: Vec<CandidateSet> = ranked.into_iter().map(|(_, l)| l.clone()).collect();
        let merged = merge_candidates(&ordered, self.config.proximity_seconds)?;

        let total: usize = lists.iter().map(CandidateSet::len).sum();
        info!(
            sources = ordered.len(),
            input = total,
            merged = merged.len(),
            proximity_seconds = self.config.proximity_seconds,
            "Merged candidate sources"
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vthumb_models::{FrameRef, Provenance, SceneAnalysis};

    fn candidate(source: &str, ts: f64, score: f64) -> Candidate {
        Candidate::new(
            FrameRef::new((ts * 30.0) as u64, ts),
            ProfileId::from(source),
            SceneAnalysis::default(),
            score,
        )
    }

    fn set(source: &str, entries: &[(f64, f64)]) -> CandidateSet {
        entries.iter().map(|&(ts, s)| candidate(source, ts, s)).collect()
    }

    #[test]
    fn test_higher_priority_wins_within_window() {
        let merger = SourceMerger::new(MergeConfig::new(vec!["a".into(), "b".into()])).unwrap();
        let merged = merger
            .merge(&[set("b", &[(11.5, 9.0)]), set("a", &[(10.0, 1.0)])])
            .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.as_slice()[0].source.as_str(), "a");
        assert_eq!(merged.as_slice()[0].timestamp, 10.0);
    }

    #[test]
    fn test_window_is_strict() {
        let merged = merge_candidates(&[set("a", &[(10.0, 1.0)]), set("b", &[(12.0, 1.0)])], 2.0).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_first_source_only_drops_exact_duplicates() {
        let first = CandidateSet::from_candidates(vec![
            candidate("a", 1.0, 1.0),
            candidate("a", 1.5, 1.0),
        ]);
        let merged = merge_candidates(&[first, set("b", &[(2.0, 5.0), (8.0, 5.0)])], 2.0).unwrap();

        let timestamps: Vec<f64> = merged.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![1.0, 1.5, 8.0]);
    }

    #[test]
    fn test_later_source_checks_its_own_accepted_candidates() {
        let merged = merge_candidates(
            &[set("a", &[(0.0, 1.0)]), set("b", &[(10.0, 1.0), (11.0, 1.0)])],
            2.0,
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_empty_leading_source_makes_next_the_anchor() {
        let merged = merge_candidates(
            &[CandidateSet::new(), set("b", &[(10.0, 1.0), (11.0, 1.0)])],
            2.0,
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_all_empty_is_input_error() {
        let err = merge_candidates(&[CandidateSet::new(), CandidateSet::new()], 2.0).unwrap_err();
        assert!(matches!(err, SelectError::EmptyInput { sources: 2 }));
        assert!(err.is_input());
    }

    #[test]
    fn test_unknown_source_is_configuration_error() {
        let merger = SourceMerger::new(MergeConfig::new(vec!["a".into()])).unwrap();
        let err = merger.merge(&[set("z", &[(1.0, 1.0)])]).unwrap_err();
        assert!(matches!(err, SelectError::UnknownProfile(_)));
    }

    #[test]
    fn test_mixed_source_list_rejected() {
        let merger = SourceMerger::new(MergeConfig::default()).unwrap();
        let mixed = CandidateSet::from_candidates(vec![
            candidate(QUALITY_PROFILE, 1.0, 1.0),
            candidate(CHARACTER_PROFILE, 5.0, 1.0),
        ]);
        assert!(matches!(merger.merge(&[mixed]), Err(SelectError::InvalidInput(_))));
    }

    #[test]
    fn test_provenance_survives_merge() {
        let boosted = candidate("a", 1.0, 1.0).rescored(2.0, Provenance::Personalized);
        let merged = merge_candidates(&[CandidateSet::from_candidates(vec![boosted])], 2.0).unwrap();
        assert_eq!(merged.as_slice()[0].provenance, Provenance::Personalized);
        assert_eq!(merged.as_slice()[0].base_score, 1.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(MergeConfig::default().validate().is_ok());
        assert!(MergeConfig::new(vec![]).validate().is_err());
        assert!(MergeConfig::new(vec!["a".into(), "a".into()]).validate().is_err());
        assert!(MergeConfig::default().with_proximity(f64::NAN).validate().is_err());
        assert!(merge_candidates(&[set("a", &[(1.0, 1.0)])], -1.0).is_err());
    }
}
