//! Experiment variant assignment and variant boosts.
//!
//! Assignment draws one uniform value in `[0, 1)` and walks the variants in
//! configuration order, accumulating traffic fractions. The first variant
//! whose cumulative boundary exceeds the draw wins. Mass left over when the
//! fractions sum to less than 1.0 falls through to control.
//!
//! Experimentation never blocks thumbnail selection: a broken experiment
//! config assigns control and logs a warning.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use vthumb_models::{
    Candidate, CandidateSet, ExperimentAssignment, ExperimentConfig, Provenance, UserProfile,
    CONTROL_VARIANT, TRAFFIC_SUM_TOLERANCE,
};

use crate::metrics;

/// How an assignment came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// The user already held a variant of this active experiment
    Existing,
    /// Drawn from the traffic split
    Drawn,
    /// Control because the experiment is inactive or misconfigured
    Fallback,
}

/// Result of assigning one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub experiment_id: String,
    pub variant: String,
    pub source: AssignmentSource,
}

impl Assignment {
    fn new(config: &ExperimentConfig, variant: impl Into<String>, source: AssignmentSource) -> Self {
        Self {
            experiment_id: config.id.clone(),
            variant: variant.into(),
            source,
        }
    }

    /// True when the assignment should be persisted on the user profile.
    pub fn is_new(&self) -> bool {
        self.source == AssignmentSource::Drawn
    }

    /// Record form for [`UserProfile::with_assignment`].
    pub fn to_record(&self) -> ExperimentAssignment {
        ExperimentAssignment::new(self.experiment_id.clone(), self.variant.clone())
    }
}

/// Variant for a given draw, walking cumulative traffic fractions.
pub fn variant_for_draw(config: &ExperimentConfig, draw: f64) -> &str {
    let mut cumulative = 0.0;
    for variant in &config.variants {
        cumulative += variant.traffic_fraction;
        if draw < cumulative {
            return &variant.name;
        }
    }
    CONTROL_VARIANT
}

/// Why a config cannot be used for bucketing, if it can't.
fn unusable_reason(config: &ExperimentConfig) -> Option<String> {
    if config.variants.is_empty() {
        return Some("no variants".to_string());
    }
    if let Some(bad) = config
        .variants
        .iter()
        .find(|v| !v.traffic_fraction.is_finite() || v.traffic_fraction < 0.0)
    {
        return Some(format!(
            "variant {} has traffic fraction {}",
            bad.name, bad.traffic_fraction
        ));
    }
    let total = config.traffic_total();
    if total > 1.0 + TRAFFIC_SUM_TOLERANCE {
        return Some(format!("traffic fractions sum to {:.4}", total));
    }
    None
}

/// Assign a user to a variant of an experiment.
///
/// Idempotent for active experiments: a user who already holds a known
/// variant keeps it and no random value is drawn.
pub fn assign<R: Rng + ?Sized>(user: &UserProfile, config: &ExperimentConfig, rng: &mut R) -> Assignment {
    if !config.is_active() {
        debug!(experiment = %config.id, status = ?config.status, "Experiment not active, using control");
        return Assignment::new(config, CONTROL_VARIANT, AssignmentSource::Fallback);
    }

    if let Some(existing) = user.variant_for(&config.id) {
        if config.has_variant(existing) {
            return Assignment::new(config, existing, AssignmentSource::Existing);
        }
        warn!(
            experiment = %config.id,
            user_id = %user.user_id,
            variant = %existing,
            "Stored variant no longer exists, reassigning"
        );
    }

    if let Some(reason) = unusable_reason(config) {
        warn!(experiment = %config.id, reason = %reason, "Experiment misconfigured, assigning control");
        metrics::record_assignment_fallback(&config.id);
        return Assignment::new(config, CONTROL_VARIANT, AssignmentSource::Fallback);
    }

    let total = config.traffic_total();
    if total < 1.0 - TRAFFIC_SUM_TOLERANCE {
        warn!(
            experiment = %config.id,
            total,
            "Traffic fractions sum below 1.0, remainder goes to control"
        );
    }

    let draw: f64 = rng.random();
    let variant = variant_for_draw(config, draw);

    metrics::record_assignment(&config.id, variant);
    info!(
        experiment = %config.id,
        user_id = %user.user_id,
        variant = %variant,
        "Assigned experiment variant"
    );
    Assignment::new(config, variant, AssignmentSource::Drawn)
}

/// Apply a variant's boost rule and re-sort (stable, descending).
///
/// Variants without a rule get the candidates back unchanged.
pub fn apply_boost(candidates: &CandidateSet, config: &ExperimentConfig, variant: &str) -> CandidateSet {
    let Some(rule) = config.boost_rule(variant) else {
        return candidates.clone();
    };

    let mut boosted: Vec<Candidate> = candidates
        .iter()
        .map(|c| {
            let multiplier = rule.multiplier_for(&c.scene);
            if multiplier == 1.0 {
                c.clone()
            } else {
                c.rescored(c.score * multiplier, Provenance::ExperimentBoosted)
            }
        })
        .collect();
    boosted.sort_by(|a, b| b.score.total_cmp(&a.score));

    debug!(
        experiment = %config.id,
        variant = %variant,
        boosted = boosted.iter().filter(|c| c.provenance == Provenance::ExperimentBoosted).count(),
        "Applied variant boost"
    );
    CandidateSet::from_candidates(boosted)
}
