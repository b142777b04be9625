mod auth;
mod config;
mod dto;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use migration_controller::MigrationController;
use migration_observability::{init_tracing, MetricsCollector, TracingConfig};
use migration_store::{PostgresBackupStore, PostgresMigrationJournal, RetentionConfig};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ServerConfig::from_env().unwrap_or_default();

    init_tracing(&TracingConfig {
        service_name: "migration-server".to_string(),
        json_logs: cfg.observability.json_logs,
        log_level: cfg.observability.log_level.clone(),
        ..TracingConfig::default()
    });

    tracing::info!("starting field migration server");

    let db = PgPoolOptions::new()
        .max_connections(cfg.database.pool_max)
        .acquire_timeout(Duration::from_secs(cfg.database.connection_timeout_seconds))
        .connect(&cfg.database.url)
        .await?;

    tracing::info!("running embedded migrations");
    migration_store::run_migrations(&db).await?;

    let retention = RetentionConfig::new(cfg.retention.days, cfg.retention.tombstone)?;
    let backups = Arc::new(PostgresBackupStore::new(db.clone(), retention));
    let journal = Arc::new(PostgresMigrationJournal::new(db.clone()));
    let controller = Arc::new(MigrationController::new(db.clone(), backups, journal));
    let metrics = MetricsCollector::new()?;

    let state = AppState {
        db: db.clone(),
        controller,
        metrics: metrics.clone(),
    };

    // Full auth, CORS, and rate limiting are a separate collaborator's
    // concern; `AuthContext` (see `auth.rs`) is a permissive placeholder
    // and the CORS/rate-limit `tower` layer slots below are left as
    // no-ops for that collaborator to fill in.
    let api_router = Router::new()
        .route("/migrations/preview", post(handlers::preview))
        .route("/migrations/execute", post(handlers::execute))
        .route("/migrations/history/:formId", get(handlers::history))
        .route("/migrations/rollback/:migrationId", post(handlers::rollback))
        .route("/migrations/backups/:formId", get(handlers::backups))
        .route("/migrations/restore/:backupId", post(handlers::restore))
        .route("/migrations/queue/status", get(handlers::queue_status))
        .route("/migrations/cleanup", delete(handlers::cleanup))
        .route("/health", get(handlers::health))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    let metrics_router = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state);

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.metrics_port));
    tracing::info!(%metrics_addr, "metrics server listening");
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(metrics_addr)
            .await
            .expect("failed to bind metrics server");
        axum::serve(listener, metrics_router)
            .await
            .expect("metrics server failed");
    });

    let addr: SocketAddr = format!("{}:{}", cfg.server.listen_address, cfg.server.http_port).parse()?;
    tracing::info!(%addr, "api server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, api_router).await?;

    Ok(())
}
