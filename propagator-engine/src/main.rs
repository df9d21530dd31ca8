//! Propagate one migration bundle to a tenant catalog and report the
//! resulting job. The HTTP/SSE surface a real deployment puts in front of
//! this is out of scope here; this binary drives `Engine` directly from
//! the environment rather than exposing one over HTTP.
use std::future::ready;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use envconfig::Envconfig;
use tracing::info;

use propagator_common::health::HealthRegistry;
use propagator_common::metrics::{serve, setup_metrics_router};
use propagator_common::{Catalog, GeneratorBundle, StaticCatalog, Target};

use propagator_engine::{EngineConfig, EnvCredentialStore, Engine, EngineError};

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::init_from_env().expect("Invalid configuration:");

    let liveness = HealthRegistry::new("liveness");
    let engine_liveness = liveness
        .register("engine".to_string(), time::Duration::seconds(60))
        .await;
    engine_liveness.report_healthy().await;

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .merge(setup_metrics_router());
    let bind = config.bind();
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving metrics");
    });

    let bundle_dir = std::env::var("PROPAGATOR_BUNDLE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./bundle"));
    let pattern = std::env::var("PROPAGATOR_TARGET_PATTERN").unwrap_or_else(|_| "%".to_string());

    let bundle = GeneratorBundle::load(&bundle_dir)?;
    info!(version_id = %bundle.version_id, "loaded generator bundle");

    let catalog = demo_catalog();
    let engine = Engine::new(Arc::new(EnvCredentialStore));

    let job_id = engine
        .submit_job(bundle, config.default_policy(), &catalog, &pattern)
        .await?;
    info!(%job_id, "job submitted");

    let mut events = engine.subscribe(job_id).await?;
    while let Some(event) = events.recv().await {
        info!(%job_id, ?event, "progress");
    }

    let job = engine.job_snapshot(job_id)?;
    info!(
        %job_id,
        status = ?job.status,
        succeeded = job.counts.succeeded,
        skipped = job.counts.skipped,
        failed = job.counts.failed,
        "job finished"
    );

    Ok(())
}

/// Placeholder tenant catalog for the binary's demo entry point. A real
/// deployment supplies its own `Catalog` backed by its tenant registry.
fn demo_catalog() -> impl Catalog {
    let targets = std::env::var("PROPAGATOR_DATABASE_URL")
        .ok()
        .map(|url| vec![target_from_url(&url)])
        .unwrap_or_default();
    StaticCatalog::new(targets)
}

fn target_from_url(url: &str) -> Target {
    let parsed = url::Url::parse(url).expect("PROPAGATOR_DATABASE_URL must be a valid URL");
    Target::new(
        parsed.host_str().unwrap_or("localhost"),
        parsed.port().unwrap_or(5432),
        parsed.path().trim_start_matches('/'),
        "default",
    )
}

pub async fn index() -> &'static str {
    "propagator engine"
}
