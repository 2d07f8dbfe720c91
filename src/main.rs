use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tesla_telemetry::api::{self, AppState};
use tesla_telemetry::ingest::{IngestPipeline, Ingestor};
use tesla_telemetry::repositories::PgReadingStore;
use tesla_telemetry::scheduler::IngestionScheduler;
use tesla_telemetry::teslafi::TeslaFiClient;
use tesla_telemetry::{db, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting tesla-telemetry");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = if Path::new(&cfg_path).exists() {
        Config::load(&cfg_path)?
    } else {
        info!("No config file at {}, using environment", cfg_path);
        Config::from_env()?
    };
    info!("Configuration loaded");

    let pool = db::connect(&cfg.database).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    db::ensure_schema(&pool).await?;
    info!("Connected to database");

    let store_timeout = Duration::from_secs(cfg.ingestion.store_timeout_secs);
    let store = Arc::new(PgReadingStore::new(pool.clone(), store_timeout));
    let client = TeslaFiClient::new(&cfg.teslafi)?;
    let token_configured = client.has_token();
    if !token_configured {
        tracing::warn!("TESLAFI_API_TOKEN is not set; every fetch will fail");
    }

    let ingestor = Ingestor::new(store.clone(), store_timeout);
    let pipeline = IngestPipeline::new(Arc::new(client), ingestor);
    let scheduler = IngestionScheduler::new(
        pipeline.clone(),
        cfg.ingestion.interval_minutes,
        cfg.ingestion.run_on_start,
    );
    if cfg.ingestion.autostart {
        scheduler.start();
    }

    let router = api::create_router(AppState {
        store,
        pipeline,
        scheduler: scheduler.clone(),
        token_configured,
    });
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    let serve = axum::serve(listener, router);
    if let Err(e) = serve.with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(error = %e, "API server error");
    }

    // lets an in-flight cycle finish
    scheduler.shutdown().await;
    pool.close().await;

    info!("Application shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
