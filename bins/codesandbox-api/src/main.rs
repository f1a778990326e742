mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use codesandbox_common::Config;
use codesandbox_engine::{Orchestrator, RunnerRegistry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Code sandbox API booting...");

    metrics::init_metrics();
    info!("Metrics registry initialized");

    let config = Config::from_env();
    let registry = RunnerRegistry::with_defaults(&config).with_context(|| {
        format!(
            "failed to load language configuration from {}",
            config.languages_path.display()
        )
    })?;
    info!(
        languages = ?registry.languages(),
        workspace_root = %config.workspace_root.display(),
        harness_root = %config.harness_root.display(),
        max_parallel_tests = config.max_parallel_tests,
        failure_policy = ?config.failure_policy,
        "Judging pipeline configured"
    );

    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(Arc::new(registry), Arc::new(config)),
    });
    let app = routes::app(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("API shutdown complete");
    Ok(())
}

/// `LOG_FORMAT=json` switches to structured output for log shipping
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
