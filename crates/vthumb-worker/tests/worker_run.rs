//! Worker runs against files on disk.

use std::fs;
use std::io::Write;
use std::sync::Arc;

use vthumb_models::{FrameFeatures, Subject};
use vthumb_worker::{
    ContentInfo, JsonLinesExtractor, JsonMetadataSink, SelectionRunner, ThumbnailBatch, WorkerConfig,
};

fn write_features(path: &std::path::Path) {
    let mut file = fs::File::create(path).unwrap();
    let layouts: [&[f64]; 5] = [&[], &[0.35], &[0.2], &[0.2, 0.2], &[0.2, 0.2, 0.2, 0.2]];
    for (i, layout) in layouts.iter().enumerate() {
        let frame = FrameFeatures::new(i as u64, i as f64 * 6.0)
            .with_subjects(layout.iter().map(|&c| Subject::with_coverage(0.9, c)).collect())
            .with_stats(130.0, 0.45, 0.25, 600.0);
        writeln!(file, "{}", serde_json::to_string(&frame).unwrap()).unwrap();
    }
    writeln!(file, "{{broken").unwrap();
}

#[tokio::test]
async fn test_personalized_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let features = dir.path().join("features.jsonl");
    write_features(&features);

    let pipeline = dir.path().join("pipeline.json");
    fs::write(
        &pipeline,
        r#"{
            "profiles": [{
                "id": "character",
                "weights": {"subject_prominence": 0.4, "composition": 0.15, "visual_interest": 0.2},
                "composition_scores": {"closeup": 3.0, "duo": 2.5, "ensemble": 2.0, "wide": 1.0},
                "acceptance_threshold": 0.3
            }],
            "merge": {"source_priority": ["character"]},
            "experiment": {
                "id": "thumbs",
                "variants": [
                    {"name": "control", "traffic_fraction": 0.5},
                    {"name": "ensemble_first", "traffic_fraction": 0.5}
                ],
                "boost_rules": {
                    "ensemble_first": {"kind": "scene_type_is", "scene_type": "ensemble", "multiplier": 1.5}
                }
            }
        }"#,
    )
    .unwrap();

    let user = dir.path().join("user.json");
    fs::write(
        &user,
        r#"{"user_id": "viewer-1", "preferred_scene_types": ["duo"], "active_experiment": {"experiment_id": "thumbs", "variant": "ensemble_first"}}"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    let config = WorkerConfig {
        features_path: Some(features.clone()),
        output_dir: out.clone(),
        pipeline_config_path: Some(pipeline),
        user_profile_path: Some(user),
        thumbnail_count: 3,
        content: ContentInfo {
            content_id: "movie-7".to_string(),
            title: "Movie Seven".to_string(),
            genres: vec!["animation".to_string()],
        },
        ..WorkerConfig::default()
    };

    let runner = SelectionRunner::new(
        config,
        Arc::new(JsonLinesExtractor::new(&features)),
        Arc::new(JsonMetadataSink::new(&out)),
    )
    .unwrap();
    let report = runner.run("run-e2e").await.unwrap();

    assert_eq!(report.selected, 3);
    assert_eq!(report.variant.as_deref(), Some("ensemble_first"));
    assert_eq!(report.stats.frames_skipped, 1);

    let batch: ThumbnailBatch =
        serde_json::from_str(&fs::read_to_string(&report.sidecar_path).unwrap()).unwrap();
    assert_eq!(batch.content_id, "movie-7");
    assert_eq!(batch.thumbnails.len(), 3);
    assert_eq!(batch.statistics.per_source["character"], 3);

    let ids: Vec<u32> = batch.thumbnails.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let labels: Vec<&str> = batch.thumbnails.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["hero_closeup", "ensemble_shot", "duo_interaction"]);
}

#[tokio::test]
async fn test_bad_pipeline_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = dir.path().join("pipeline.json");
    fs::write(&pipeline, r#"{"merge": {"source_priority": ["nope"]}}"#).unwrap();

    let config = WorkerConfig {
        pipeline_config_path: Some(pipeline),
        ..WorkerConfig::default()
    };
    let result = SelectionRunner::new(
        config,
        Arc::new(JsonLinesExtractor::new(dir.path().join("missing.jsonl"))),
        Arc::new(JsonMetadataSink::new(dir.path())),
    );

    let err = result.err().expect("unknown profile must be rejected");
    assert!(err.is_configuration());
}
