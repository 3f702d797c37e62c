use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vestra_db::postgres::{PgQueue, PgStore, DEFAULT_VISIBILITY_TIMEOUT};
use vestra_processor::blender::BlenderProcessor;
use vestra_worker::config::WorkerConfig;
use vestra_worker::runner::WorkerLoop;
use vestra_worker::single_shot::{self, SingleShotParams, INPUT_VAR};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vestra_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        bin = %config.blender_bin.display(),
        script = %config.process_script.display(),
        "Loaded worker configuration"
    );

    let processor = BlenderProcessor::new(
        config.blender_bin.clone(),
        config.process_script.clone(),
        config.process_timeout,
    );

    // --- One-shot mode ---
    if std::env::var(INPUT_VAR).is_ok() {
        let params = match SingleShotParams::from_env() {
            Ok(params) => params,
            Err(e) => {
                tracing::error!(error = %e, "Invalid one-shot parameters");
                return ExitCode::FAILURE;
            }
        };
        return match single_shot::run(&processor, &params).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "One-shot invocation failed");
                ExitCode::FAILURE
            }
        };
    }

    // --- Store & queue backend ---
    // The loop needs durable shared state; there is no in-memory fallback
    // here because a worker-local queue would never receive submissions.
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::error!("DATABASE_URL must be set for queue mode");
            return ExitCode::FAILURE;
        }
    };

    let pool = match vestra_db::create_pool(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = vestra_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run database migrations");
        return ExitCode::FAILURE;
    }

    let visibility = std::env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT);

    let worker = WorkerLoop::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(PgQueue::new(pool, visibility)),
        Arc::new(processor),
        config,
    );

    // --- Shutdown wiring ---
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    worker.run(cancel).await;
    ExitCode::SUCCESS
}
