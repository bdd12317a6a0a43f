//! Tiered Cache - response cache for a stock-tracking backend
//!
//! Serves cached news and quote lookups and notification throttling over
//! HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::api::{create_router, AppState};
use tiered_cache::cache::{DurableStore, MemoryStore, SledStore};
use tiered_cache::config::Config;
use tiered_cache::spawn_flush_task;
use tiered_cache::upstream::HttpMarketData;

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable store (sled if configured, otherwise in-memory)
/// 4. Build the news and quote caches over the shared store
/// 5. Start maintenance flush tasks if enabled
/// 6. Serve HTTP until SIGINT/SIGTERM, then flush pending entries once
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tiered cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: news_polling={}s, quote_polling={}s, durable_ttl={}s, port={}",
        config.news_polling_interval,
        config.quote_polling_interval,
        config.durable_ttl,
        config.server_port
    );

    let store: Arc<dyn DurableStore> = match &config.durable_path {
        Some(path) => {
            info!("Durable tier: sled database at {}", path);
            Arc::new(SledStore::open(path).context("Failed to open durable store")?)
        }
        None => {
            warn!("DURABLE_PATH not set, durable tier is in-memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let upstream = Arc::new(HttpMarketData::new(
        config.upstream_base_url.clone(),
        config.upstream_api_key.clone(),
    )?);

    let state = AppState::from_config(&config, store, upstream);

    let mut tasks = Vec::new();
    if config.maintenance_flush_interval > 0 {
        tasks.push(spawn_flush_task(
            state.news.clone(),
            config.maintenance_flush_interval,
        ));
        tasks.push(spawn_flush_task(
            state.quotes.clone(),
            config.maintenance_flush_interval,
        ));
        info!("Maintenance flush tasks started");
    }

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("Server error")?;

    let news = state.news.flush_pending().await;
    let quotes = state.quotes.flush_pending().await;
    info!(
        "Final flush: news wrote {}/{}, quotes wrote {}/{}",
        news.written, news.attempted, quotes.written, quotes.attempted
    );

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance tasks and allows graceful shutdown.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in &tasks {
        task.abort();
    }
    if !tasks.is_empty() {
        warn!("Maintenance tasks aborted");
    }
}
