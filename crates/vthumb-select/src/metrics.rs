//! Metrics emitted by the selection core.
//!
//! Uses the `metrics` facade; nothing is recorded unless the host process
//! installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Classification
    pub const FRAMES_CLASSIFIED_TOTAL: &str = "vthumb_frames_classified_total";
    pub const FRAMES_SKIPPED_TOTAL: &str = "vthumb_frames_skipped_total";

    // Scoring
    pub const CANDIDATES_SCORED_TOTAL: &str = "vthumb_candidates_scored_total";
    pub const CANDIDATES_ACCEPTED_TOTAL: &str = "vthumb_candidates_accepted_total";

    // Merge / selection
    pub const CANDIDATES_DEDUPLICATED_TOTAL: &str = "vthumb_candidates_deduplicated_total";
    pub const THUMBNAILS_SELECTED_TOTAL: &str = "vthumb_thumbnails_selected_total";
    pub const SELECTION_FILL_TOTAL: &str = "vthumb_selection_fill_total";

    // Experiments / engagement
    pub const EXPERIMENT_ASSIGNMENTS_TOTAL: &str = "vthumb_experiment_assignments_total";
    pub const EXPERIMENT_FALLBACKS_TOTAL: &str = "vthumb_experiment_fallbacks_total";
    pub const THUMBNAIL_IMPRESSIONS_TOTAL: &str = "vthumb_thumbnail_impressions_total";
    pub const THUMBNAIL_CLICKS_TOTAL: &str = "vthumb_thumbnail_clicks_total";

    // Pipeline
    pub const PIPELINE_DURATION_SECONDS: &str = "vthumb_pipeline_duration_seconds";
}

pub fn record_frame_classified() {
    counter!(names::FRAMES_CLASSIFIED_TOTAL).increment(1);
}

pub fn record_frame_skipped(reason: &'static str) {
    counter!(names::FRAMES_SKIPPED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_profile_scored(profile: &str, scored: usize, accepted: usize) {
    let labels = [("profile", profile.to_string())];
    counter!(names::CANDIDATES_SCORED_TOTAL, &labels).increment(scored as u64);
    counter!(names::CANDIDATES_ACCEPTED_TOTAL, &labels).increment(accepted as u64);
}

pub fn record_deduplicated(source: &str, dropped: usize) {
    if dropped > 0 {
        let labels = [("source", source.to_string())];
        counter!(names::CANDIDATES_DEDUPLICATED_TOTAL, &labels).increment(dropped as u64);
    }
}

pub fn record_selection(selected: usize, filled: usize) {
    counter!(names::THUMBNAILS_SELECTED_TOTAL).increment(selected as u64);
    counter!(names::SELECTION_FILL_TOTAL).increment(filled as u64);
}

pub fn record_assignment(experiment: &str, variant: &str) {
    let labels = [
        ("experiment", experiment.to_string()),
        ("variant", variant.to_string()),
    ];
    counter!(names::EXPERIMENT_ASSIGNMENTS_TOTAL, &labels).increment(1);
}

pub fn record_assignment_fallback(experiment: &str) {
    let labels = [("experiment", experiment.to_string())];
    counter!(names::EXPERIMENT_FALLBACKS_TOTAL, &labels).increment(1);
}

pub fn record_impression(thumbnail_type: &str) {
    let labels = [("thumbnail_type", thumbnail_type.to_string())];
    counter!(names::THUMBNAIL_IMPRESSIONS_TOTAL, &labels).increment(1);
}

pub fn record_click(thumbnail_type: &str) {
    let labels = [("thumbnail_type", thumbnail_type.to_string())];
    counter!(names::THUMBNAIL_CLICKS_TOTAL, &labels).increment(1);
}

pub fn record_pipeline_duration(duration_secs: f64) {
    histogram!(names::PIPELINE_DURATION_SECONDS).record(duration_secs);
}
