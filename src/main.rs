use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use prisme::api::{self, AppState};
use prisme::config::Config;
use prisme::eventstore::BatchingWriter;
use prisme::sourceregistry::StaticSourceRegistry;
use prisme::storage::{AnalyticsStore, ClickhouseStore};
use prisme::uaparser::WootheeClassifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let default_filter = if config.server.debug {
        "debug"
    } else {
        "prisme=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
    info!(?config, "Loaded configuration");

    // Initialize analytics store
    let store = Arc::new(ClickhouseStore::new(&config.clickhouse));
    info!("Initializing ClickHouse schema...");
    store.init().await?;

    let source_registry = StaticSourceRegistry::new(config.source_registry.sources.clone());
    info!(sources = source_registry.len(), "Source registry loaded");

    // Start the batching writer
    let (writer, mut writer_handle) = BatchingWriter::spawn(store, config.eventstore.clone());

    let state = Arc::new(AppState {
        event_store: Arc::new(writer.clone()),
        source_registry: Arc::new(source_registry),
        ua_classifier: Arc::new(WootheeClassifier::new()),
    });
    let router = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Prisme listening on http://{}", addr);

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        served = server => {
            served.context("HTTP server failed")?;
        }
        // The writer only stops on its own after a fatal store error.
        stopped = &mut writer_handle => {
            let err = match stopped {
                Ok(Ok(())) => anyhow::anyhow!("pageview writer stopped unexpectedly"),
                Ok(Err(e)) => e.into(),
                Err(e) => e.into(),
            };
            error!(error = %err, "Pageview writer is down, shutting down");
            return Err(err);
        }
    }

    info!("HTTP server stopped, flushing pending pageviews...");
    writer.shutdown();
    writer_handle
        .await
        .context("pageview writer panicked")?
        .context("failed to flush pending pageviews")?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
