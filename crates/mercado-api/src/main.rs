//! Mercado accounts API server entry point.

use std::sync::Arc;

use mercado_api::config::AppConfig;
use mercado_api::error::AppError;
use mercado_api::state::AppState;
use mercado_api::workers::{WorkerConfig, WorkerDeps, Workers};
use mercado_core::retry::RetryPolicy;
use mercado_messaging::InMemoryBroker;
use mercado_outbox::schema::MIGRATOR;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting Mercado accounts API server");

    let config = AppConfig::from_env()?;

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let workers = if config.run_workers {
        let worker_config = WorkerConfig {
            publisher: config.publisher.clone(),
            consumer_retry: RetryPolicy::default(),
        };
        let broker = Arc::new(InMemoryBroker::new());
        Some(Workers::start(WorkerDeps::postgres(&pool), broker, worker_config, &shutdown_rx).await?)
    } else {
        info!("RUN_WORKERS is off, serving HTTP only");
        None
    };

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = mercado_api::app(AppState::postgres(&pool))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown requested");
        shutdown_tx.send_replace(true);
    });

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Some(workers) = workers {
        workers.join().await;
    }
    pool.close().await;
    info!("Mercado accounts API server stopped");

    Ok(())
}
