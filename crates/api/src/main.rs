use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vestra_api::config::ServerConfig;
use vestra_api::router::build_app_router;
use vestra_api::state::AppState;
use vestra_db::memory::{MemoryQueue, MemoryStore};
use vestra_db::postgres::{PgQueue, PgStore, DEFAULT_VISIBILITY_TIMEOUT};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vestra_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let visibility = std::env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT);

    // --- Store & queue backend ---
    let state = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = vestra_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            vestra_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            vestra_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            AppState {
                store: Arc::new(PgStore::new(pool.clone())),
                queue: Arc::new(PgQueue::new(pool, visibility)),
                config: Arc::new(config.clone()),
            }
        }
        Err(_) => {
            // Single-node development mode: jobs survive only as long as
            // the process, and the worker loop must run in-process to
            // drain them. Production sets DATABASE_URL.
            tracing::warn!("DATABASE_URL not set; using in-memory store and queue");
            AppState {
                store: Arc::new(MemoryStore::new()),
                queue: Arc::new(MemoryQueue::new(visibility)),
                config: Arc::new(config.clone()),
            }
        }
    };

    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
