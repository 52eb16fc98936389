//! Pipeline configuration.
//!
//! Every tuning knob of the selection core is data. A JSON document may
//! supply any subset of the sections below; missing sections take their
//! documented defaults.

use serde::{Deserialize, Serialize};

use vthumb_models::ExperimentConfig;

use crate::classifier::ClassifierConfig;
use crate::error::{SelectError, SelectResult};
use crate::merger::MergeConfig;
use crate::personalization::PersonalizationWeights;
use crate::profile::{ProfileRegistry, ScoringProfile};
use crate::selector::SelectorConfig;

/// Full configuration of a [`crate::ThumbnailPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub classifier: ClassifierConfig,

    /// Scoring profiles, each producing one candidate source
    pub profiles: Vec<ScoringProfile>,

    pub merge: MergeConfig,
    pub selector: SelectorConfig,
    pub personalization: PersonalizationWeights,

    /// Experiment to bucket personalized requests into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<ExperimentConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            profiles: ProfileRegistry::builtin().profiles().to_vec(),
            merge: MergeConfig::default(),
            selector: SelectorConfig::default(),
            personalization: PersonalizationWeights::default(),
            experiment: None,
        }
    }
}

impl PipelineConfig {
    /// Parse from a JSON document.
    pub fn from_json(json: &str) -> SelectResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_experiment(mut self, experiment: ExperimentConfig) -> Self {
        self.experiment = Some(experiment);
        self
    }

    /// Check the configuration is internally consistent.
    ///
    /// Every profile must appear in the merge priority order and every
    /// priority entry must name a profile. Experiment problems are not
    /// checked here: a broken experiment degrades to control at request
    /// time.
    pub fn validate(&self) -> SelectResult<()> {
        let confidence = self.classifier.confidence_threshold;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SelectError::configuration(format!(
                "confidence threshold must be within [0, 1], got {}",
                confidence
            )));
        }

        let registry = self.registry()?;
        if registry.is_empty() {
            return Err(SelectError::configuration("no scoring profiles configured"));
        }
        self.merge.validate()?;

        for id in &self.merge.source_priority {
            registry.get(id)?;
        }
        for id in registry.ids() {
            self.merge.rank_of(&id).map_err(|_| {
                SelectError::configuration(format!(
                    "profile {} is missing from the source priority order",
                    id
                ))
            })?;
        }

        Ok(())
    }

    /// Profiles as a validated registry.
    pub fn registry(&self) -> SelectResult<ProfileRegistry> {
        ProfileRegistry::new(self.profiles.clone())
    }
}
