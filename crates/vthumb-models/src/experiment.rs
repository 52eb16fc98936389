//! Experiment (A/B test) configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::scene::{SceneAnalysis, SceneType};

/// Variant that receives unassigned probability mass and config fallbacks.
pub const CONTROL_VARIANT: &str = "control";

/// Allowed deviation of the traffic fraction sum from 1.0.
pub const TRAFFIC_SUM_TOLERANCE: f64 = 1e-3;

/// Lifecycle state of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

/// A named bucket of users and the share of traffic it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VariantSpec {
    pub name: String,
    pub traffic_fraction: f64,
}

impl VariantSpec {
    pub fn new(name: impl Into<String>, traffic_fraction: f64) -> Self {
        Self {
            name: name.into(),
            traffic_fraction,
        }
    }
}

/// Pure score transform applied to every candidate of a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoostRule {
    /// Multiply when the scene type name contains `needle`.
    SceneTypeContains { needle: String, multiplier: f64 },
    /// Multiply when the scene type equals `scene_type`.
    SceneTypeIs { scene_type: SceneType, multiplier: f64 },
    /// Multiply when the action level is strictly above `threshold`.
    ActionLevelAbove { threshold: u8, multiplier: f64 },
}

impl BoostRule {
    /// Multiplier this rule applies to a scene (1.0 when it does not match).
    pub fn multiplier_for(&self, scene: &SceneAnalysis) -> f64 {
        let (matches, multiplier) = match self {
            Self::SceneTypeContains { needle, multiplier } => {
                (scene.scene_type.as_str().contains(needle.as_str()), *multiplier)
            }
            Self::SceneTypeIs {
                scene_type,
                multiplier,
            } => (scene.scene_type == *scene_type, *multiplier),
            Self::ActionLevelAbove {
                threshold,
                multiplier,
            } => (scene.action_level > *threshold, *multiplier),
        };

        if matches && multiplier.is_finite() && multiplier >= 0.0 {
            multiplier
        } else {
            1.0
        }
    }
}

/// Controlled experiment over thumbnail strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExperimentConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Variants in bucketing order
    pub variants: Vec<VariantSpec>,

    /// Boost rule per variant name; variants without a rule are unboosted
    #[serde(default)]
    pub boost_rules: BTreeMap<String, BoostRule>,

    #[serde(default)]
    pub status: ExperimentStatus,
}

impl ExperimentConfig {
    /// Create an active experiment with no boost rules.
    pub fn new(id: impl Into<String>, variants: Vec<VariantSpec>) -> Self {
        Self {
            id: id.into(),
            description: None,
            variants,
            boost_rules: BTreeMap::new(),
            status: ExperimentStatus::Active,
        }
    }

    /// Attach a boost rule to a variant.
    pub fn with_boost_rule(mut self, variant: impl Into<String>, rule: BoostRule) -> Self {
        self.boost_rules.insert(variant.into(), rule);
        self
    }

    /// Set the lifecycle status.
    pub fn with_status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    /// The thumbnail-strategy experiment: control plus three boosted variants.
    pub fn thumbnail_strategy() -> Self {
        Self::new(
            "thumbnail_strategy",
            vec![
                VariantSpec::new(CONTROL_VARIANT, 0.25),
                VariantSpec::new("character_focus", 0.25),
                VariantSpec::new("action_boost", 0.25),
                VariantSpec::new("ensemble_preference", 0.25),
            ],
        )
        .with_boost_rule(
            "character_focus",
            BoostRule::SceneTypeContains {
                needle: "character".to_string(),
                multiplier: 1.2,
            },
        )
        .with_boost_rule(
            "action_boost",
            BoostRule::ActionLevelAbove {
                threshold: 5,
                multiplier: 1.3,
            },
        )
        .with_boost_rule(
            "ensemble_preference",
            BoostRule::SceneTypeIs {
                scene_type: SceneType::Ensemble,
                multiplier: 1.15,
            },
        )
    }

    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }

    /// Sum of all traffic fractions.
    pub fn traffic_total(&self) -> f64 {
        self.variants.iter().map(|v| v.traffic_fraction).sum()
    }

    pub fn has_variant(&self, name: &str) -> bool {
        name == CONTROL_VARIANT || self.variants.iter().any(|v| v.name == name)
    }

    /// Boost rule for a variant, if any.
    pub fn boost_rule(&self, variant: &str) -> Option<&BoostRule> {
        self.boost_rules.get(variant)
    }

    /// Check the traffic split.
    ///
    /// Fractions must be finite and non-negative, and their sum must be
    /// within [`TRAFFIC_SUM_TOLERANCE`] of 1.0.
    pub fn validate(&self) -> ModelResult<()> {
        if self.variants.is_empty() {
            return Err(ModelError::invalid_experiment(format!(
                "experiment {} has no variants",
                self.id
            )));
        }

        if let Some(bad) = self
            .variants
            .iter()
            .find(|v| !v.traffic_fraction.is_finite() || v.traffic_fraction < 0.0)
        {
            return Err(ModelError::invalid_experiment(format!(
                "variant {} has invalid traffic fraction {}",
                bad.name, bad.traffic_fraction
            )));
        }

        let total = self.traffic_total();
        if (total - 1.0).abs() > TRAFFIC_SUM_TOLERANCE {
            return Err(ModelError::invalid_experiment(format!(
                "traffic fractions of {} sum to {:.4}, expected 1.0",
                self.id, total
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_strategy_is_valid() {
        let config = ExperimentConfig::thumbnail_strategy();
        assert!(config.validate().is_ok());
        assert!(config.has_variant("action_boost"));
        assert!(config.boost_rule(CONTROL_VARIANT).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_sums() {
        let over = ExperimentConfig::new(
            "over",
            vec![VariantSpec::new("a", 0.7), VariantSpec::new("b", 0.7)],
        );
        assert!(over.validate().is_err());

        let under = ExperimentConfig::new("under", vec![VariantSpec::new("a", 0.4)]);
        assert!(under.validate().is_err());

        let negative = ExperimentConfig::new(
            "neg",
            vec![VariantSpec::new("a", 1.5), VariantSpec::new("b", -0.5)],
        );
        assert!(negative.validate().is_err());

        assert!(ExperimentConfig::new("empty", vec![]).validate().is_err());
    }

    #[test]
    fn test_boost_rule_multipliers() {
        let scene = SceneAnalysis {
            scene_type: SceneType::CharacterFocus,
            action_level: 7,
            ..Default::default()
        };

        let contains = BoostRule::SceneTypeContains {
            needle: "character".to_string(),
            multiplier: 1.2,
        };
        let action = BoostRule::ActionLevelAbove {
            threshold: 7,
            multiplier: 1.3,
        };
        let ensemble = BoostRule::SceneTypeIs {
            scene_type: SceneType::Ensemble,
            multiplier: 1.15,
        };

        assert!((contains.multiplier_for(&scene) - 1.2).abs() < 1e-9);
        assert!((action.multiplier_for(&scene) - 1.0).abs() < 1e-9);
        assert!((ensemble.multiplier_for(&scene) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_boost_rule_serde_shape() {
        let rule: BoostRule = serde_json::from_str(
            r#"{"kind": "action_level_above", "threshold": 5, "multiplier": 1.3}"#,
        )
        .unwrap();
        assert_eq!(
            rule,
            BoostRule::ActionLevelAbove {
                threshold: 5,
                multiplier: 1.3
            }
        );
    }
}
