//! CodeQual Analysis Service - Main Entry Point
//!
//! Composition root: loads settings, wires the adapters into the scheduler
//! and serves HTTP until Ctrl-C.

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use codequal_api_http::{serve, AppState, JwtSessionVerifier};
use codequal_core::application::{AnalysisRunner, JobScheduler, ResultsGateway};
use codequal_core::port::id_provider::UuidProvider;
use codequal_core::port::time_provider::SystemTimeProvider;
use codequal_core::VERSION;
use codequal_infra_memory::InMemoryJobStore;
use codequal_infra_system::{GitFetcher, ProcessRunner, ScannerEngine, TempWorkspaceManager};

use settings::{LogFormat, Settings};

const DEFAULT_LOG_FILTER: &str = "codequal=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (before logging: the format is a setting)
    let settings = Settings::load()?;

    // 2. Initialize logging
    let (otel_layer, telemetry_status) = telemetry::init_telemetry()?;
    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let fmt_layer = match settings.log_format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        // Development: Pretty formatting
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!("CodeQual analysis service v{} starting...", VERSION);
    telemetry_status.log();
    info!(settings = ?settings, "Settings loaded");

    // 3. Workspace root: clear whatever a previous process left behind
    let workspaces = Arc::new(
        TempWorkspaceManager::new(settings.workspace_root())
            .context("Workspace root is unusable")?,
    );
    match workspaces.sweep_orphans() {
        Ok(removed) => info!(removed, root = %workspaces.root().display(), "Workspace sweep completed"),
        Err(e) => warn!(error = %e, "Workspace sweep failed"),
    }

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let store = Arc::new(InMemoryJobStore::new());
    let process_runner = ProcessRunner::default();

    let fetcher = Arc::new(GitFetcher::new(
        settings.git_config(),
        process_runner.clone(),
    ));
    let engine = Arc::new(ScannerEngine::new(settings.engine_config(), process_runner));

    let runner = Arc::new(AnalysisRunner::new(
        store.clone(),
        workspaces,
        fetcher,
        engine,
        time_provider.clone(),
    ));
    let scheduler = Arc::new(JobScheduler::new(
        store.clone(),
        runner,
        id_provider,
        time_provider,
        settings.scheduler_config(),
    ));
    let gateway = Arc::new(ResultsGateway::new(store));
    let verifier = Arc::new(JwtSessionVerifier::new(settings.token_secret()));

    let state = AppState::new(scheduler.clone(), gateway, verifier);

    // 5. Serve until Ctrl-C
    info!("Press Ctrl+C to shutdown");
    serve(&settings.http_config(), state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // 6. Graceful shutdown: give running pipelines a chance to finish
    let in_flight = scheduler.in_flight();
    if in_flight > 0 {
        info!(in_flight, drain = ?settings.shutdown_drain(), "Waiting for running analyses");
        if tokio::time::timeout(settings.shutdown_drain(), scheduler.wait_idle())
            .await
            .is_err()
        {
            warn!(
                in_flight = scheduler.in_flight(),
                "Drain timeout reached, abandoning running analyses"
            );
        }
    }

    telemetry::shutdown_telemetry();
    info!("Shutdown complete.");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received. Stopping HTTP server...");
}
