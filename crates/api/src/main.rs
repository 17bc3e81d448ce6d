//! Field CRM API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crm_common::config::AppConfig;
use crm_common::db::{create_pool, run_migrations};
use crm_common::redis_pool::create_redis_pool;

use crm_api::routes::create_router;
use crm_api::state::{AppState, build_dispatcher};

/// Request bodies larger than this are rejected with 413.
const MAX_BODY_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("crm_api=debug,crm_engine=debug,crm_notifier=info,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting field CRM API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Create Redis connection
    let redis = create_redis_pool(&config.redis_url).await?;

    // Messaging provider + dispatcher
    let dispatcher = Arc::new(build_dispatcher(&config)?);

    let port = config.api_port;
    let state = AppState::new(pool, redis, config, dispatcher);

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
