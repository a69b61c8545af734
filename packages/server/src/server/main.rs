// Main entry point for the materials server

use std::time::Duration;

use anyhow::{Context, Result};
use materials_core::domains::materials::MaterialsPipeline;
use materials_core::kernel::sse::{self, SseState};
use materials_core::kernel::ServerDeps;
use materials_core::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,materials_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting materials server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let deps = ServerDeps::from_config(&config)
        .await
        .context("Failed to initialize dependencies")?;
    let pipeline = MaterialsPipeline::new(&deps);

    // Start the crawl worker (stops a leftover crawl before claiming jobs)
    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(pipeline.worker.run(shutdown.clone()));

    let events = deps.events.clone();
    let cleanup_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVENT_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cleanup_shutdown.cancelled() => break,
                _ = interval.tick() => events.cleanup().await,
            }
        }
    });

    // Start server
    let app = sse::router(SseState {
        materials: pipeline.service.clone(),
    });
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Job events: http://localhost:{}/api/materials/events?jobId=<id>", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    worker
        .await
        .context("Worker task panicked")?
        .context("Worker failed")?;

    tracing::info!("Materials server stopped");
    Ok(())
}
