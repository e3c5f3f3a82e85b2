use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_service::{
    api,
    config::{Config, Storage},
    db,
    registry::DeviceRegistry,
    retention::RetentionService,
    sensors::ReadingService,
    store::{MemoryReadingStore, PgReadingStore, ReadingStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store = match &config.storage {
        Storage::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = db::create_pool(database_url, *max_connections).await?;
            db::run_migrations(&pool).await?;
            info!("Database ready");
            ReadingStore::Postgres(PgReadingStore::new(pool))
        }
        Storage::Memory => {
            warn!("Using in-memory reading store; readings are lost on restart");
            ReadingStore::Memory(MemoryReadingStore::new())
        }
    };

    let readings = ReadingService::new(store, DeviceRegistry::new(), config.service_settings());
    readings
        .seed_registry()
        .await
        .context("failed to seed device registry")?;

    match config.retention_days {
        Some(days) => {
            let retention =
                RetentionService::new(readings.clone(), days, config.retention_interval_secs);
            tokio::spawn(retention.run());
        }
        None => info!("Retention disabled; readings are kept indefinitely"),
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(readings))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
