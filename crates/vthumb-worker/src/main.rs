//! Thumbnail selection worker binary.

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vthumb_worker::{JsonLinesExtractor, JsonMetadataSink, SelectionRunner, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vthumb=info".parse()?)
        .add_directive("vthumb_select=info".parse()?)
        .add_directive("vthumb_worker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn write_metrics(handle: &PrometheusHandle, config: &WorkerConfig) {
    let Some(path) = &config.metrics_path else {
        return;
    };
    if let Err(e) = std::fs::write(path, handle.render()) {
        warn!(path = %path.display(), error = %e, "Failed to write metrics snapshot");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting vthumb-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let metrics_handle = match &config.metrics_path {
        Some(_) => Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("installing Prometheus recorder")?,
        ),
        None => None,
    };

    let features_path = config.require_features_path()?.to_path_buf();
    let extractor = Arc::new(JsonLinesExtractor::new(&features_path));
    let sink = Arc::new(JsonMetadataSink::new(&config.output_dir));
    let runner = SelectionRunner::new(config.clone(), extractor, sink)
        .with_context(|| format!("building pipeline for {}", features_path.display()))?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let result = runner.run(&run_id).await;

    if let Some(handle) = &metrics_handle {
        write_metrics(handle, &config);
    }

    match result {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                selected = report.selected,
                sidecar = %report.sidecar_path.display(),
                "Worker finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Selection run failed");
            Err(e).context("selection run failed")
        }
    }
}
