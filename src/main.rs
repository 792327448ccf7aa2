//! Cached Database - operational server
//!
//! Connects the adapter, applies migrations and serves health and stats
//! endpoints until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cached_database::api::create_router;
use cached_database::{Adapter, AppState, Config, DatabaseAdapter, MigrationConfig};

/// Main entry point for the cached database server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the adapter (Redis + PostgreSQL pool, initial health check)
/// 4. Apply pending migrations when `MIGRATIONS_DIR` is set
/// 5. Serve the health and stats endpoints
/// 6. On SIGINT/SIGTERM, stop serving and close the adapter
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cached_database=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cached database server");

    let config = Config::from_env();
    info!(
        "Config loaded: redis={}, postgres={}, timeout={:?}, ttl={:?}, cleanup={:?}, port={}",
        config.redis.endpoint,
        config.postgres.connection_url(),
        config.effective_connection_timeout(),
        config.effective_cache_ttl(),
        config.cleanup_interval,
        config.server_port
    );

    // The pool itself serves as query handle; there is no generated layer here
    let adapter = Adapter::new(&config, |pool| pool)
        .await
        .context("failed to connect adapter")?;

    if let Some(dir) = &config.migrations_dir {
        adapter
            .migrate(&MigrationConfig::new(dir))
            .await
            .with_context(|| format!("failed to apply migrations from {}", dir.display()))?;
    }

    let adapter: Arc<dyn DatabaseAdapter> = Arc::new(adapter);
    let app = create_router(AppState::new(adapter.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    adapter.close().await.context("failed to close adapter")?;
    info!("Server shutdown complete");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
