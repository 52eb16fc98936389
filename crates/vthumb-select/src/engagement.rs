//! Cross-request engagement accumulators.
//!
//! These are the only long-lived shared state in the selection core. Both
//! types are cheap to clone (shared `Arc` storage) and only ever append or
//! increment; nothing is replaced in place.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use vthumb_models::CONTROL_VARIANT;

use crate::metrics;

/// Metric used to compare variants against control.
pub const PRIMARY_METRIC: &str = "click_through_rate";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementCounts {
    pub impressions: u64,
    pub clicks: u64,
}

impl EngagementCounts {
    /// Clicks per impression (0 when never shown).
    pub fn click_through_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

/// Impression and click counters per thumbnail type.
#[derive(Debug, Clone, Default)]
pub struct EngagementLedger {
    counts: Arc<RwLock<HashMap<String, EngagementCounts>>>,
}

impl EngagementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_impression(&self, thumbnail_type: &str) {
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts.entry(thumbnail_type.to_string()).or_default().impressions += 1;
        metrics::record_impression(thumbnail_type);
    }

    pub fn record_click(&self, thumbnail_type: &str) {
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts.entry(thumbnail_type.to_string()).or_default().clicks += 1;
        metrics::record_click(thumbnail_type);
    }

    pub fn counts(&self, thumbnail_type: &str) -> EngagementCounts {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        counts.get(thumbnail_type).copied().unwrap_or_default()
    }

    /// Click-through rate per thumbnail type, suitable for
    /// `UserProfile::click_through_rates`.
    pub fn click_through_rates(&self) -> BTreeMap<String, f64> {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        counts
            .iter()
            .map(|(key, c)| (key.clone(), c.click_through_rate()))
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, EngagementCounts> {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

/// Summary statistics of one metric within one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub count: usize,
    /// Population standard deviation
    pub std: f64,
}

impl MetricSummary {
    fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            mean,
            count,
            std: variance.sqrt(),
        })
    }
}

/// Analysis of one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantAnalysis {
    pub metrics: BTreeMap<String, MetricSummary>,

    /// Percent change of the mean click-through rate over control
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_over_control: Option<f64>,
}

/// Append-only metric samples per experiment variant.
#[derive(Debug, Clone, Default)]
pub struct ExperimentResults {
    samples: Arc<RwLock<HashMap<String, HashMap<String, Vec<f64>>>>>,
}

impl ExperimentResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample. Non-finite values are ignored.
    pub fn record(&self, variant: &str, metric: &str, value: f64) {
        if !value.is_finite() {
            return;
        }
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        samples
            .entry(variant.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    /// Mean/count/std per metric and variant, with improvement over control.
    pub fn analyze(&self) -> BTreeMap<String, VariantAnalysis> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);

        let mut analysis: BTreeMap<String, VariantAnalysis> = samples
            .iter()
            .map(|(variant, by_metric)| {
                let metrics = by_metric
                    .iter()
                    .filter_map(|(metric, values)| {
                        MetricSummary::from_samples(values).map(|s| (metric.clone(), s))
                    })
                    .collect();
                (
                    variant.clone(),
                    VariantAnalysis {
                        metrics,
                        improvement_over_control: None,
                    },
                )
            })
            .collect();

        let control_mean = analysis
            .get(CONTROL_VARIANT)
            .and_then(|a| a.metrics.get(PRIMARY_METRIC))
            .map(|s| s.mean)
            .filter(|mean| *mean > 0.0);

        if let Some(control_mean) = control_mean {
            for (variant, result) in analysis.iter_mut() {
                if variant == CONTROL_VARIANT {
                    continue;
                }
                result.improvement_over_control = result
                    .metrics
                    .get(PRIMARY_METRIC)
                    .map(|s| (s.mean - control_mean) / control_mean * 100.0);
            }
        }

        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ledger_counts_and_rates() {
        let ledger = EngagementLedger::new();
        for _ in 0..4 {
            ledger.record_impression("hero_closeup");
        }
        ledger.record_click("hero_closeup");

        assert_eq!(
            ledger.counts("hero_closeup"),
            EngagementCounts {
                impressions: 4,
                clicks: 1
            }
        );
        assert!((ledger.click_through_rates()["hero_closeup"] - 0.25).abs() < 1e-9);
        assert_eq!(ledger.counts("duo_duo").click_through_rate(), 0.0);
    }

    #[test]
    fn test_ledger_is_safe_under_concurrent_updates() {
        let ledger = EngagementLedger::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.record_impression("duo_duo");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.counts("duo_duo").impressions, 800);
    }

    #[test]
    fn test_analysis_against_control() {
        let results = ExperimentResults::new();
        for value in [0.1, 0.3] {
            results.record(CONTROL_VARIANT, PRIMARY_METRIC, value);
        }
        for value in [0.3, 0.3] {
            results.record("variant_a", PRIMARY_METRIC, value);
        }
        results.record("variant_a", "watch_time", f64::NAN);

        let analysis = results.analyze();
        let control = &analysis[CONTROL_VARIANT].metrics[PRIMARY_METRIC];
        assert!((control.mean - 0.2).abs() < 1e-9);
        assert!((control.std - 0.1).abs() < 1e-9);
        assert_eq!(control.count, 2);

        let variant = &analysis["variant_a"];
        assert!((variant.improvement_over_control.unwrap() - 50.0).abs() < 1e-6);
        assert!(!variant.metrics.contains_key("watch_time"));
        assert!(analysis[CONTROL_VARIANT].improvement_over_control.is_none());
    }

    #[test]
    fn test_no_control_means_no_improvement() {
        let results = ExperimentResults::new();
        results.record("variant_a", PRIMARY_METRIC, 0.5);
        assert!(results.analyze()["variant_a"].improvement_over_control.is_none());
    }
}
