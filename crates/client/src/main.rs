use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vestra_client::api::ApiClient;
use vestra_client::config::ClientConfig;
use vestra_client::packager::{package, PackageOptions};
use vestra_client::poll::{poll_case, PollOutcome};
use vestra_client::ClientError;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vestra_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();

    match run(&config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Client run failed");
            ExitCode::FAILURE
        }
    }
}

/// Full client flow: package, upload, poll, download.
async fn run(config: &ClientConfig) -> Result<ExitCode, ClientError> {
    let options = PackageOptions {
        healthy_side: config.healthy_side,
        midline_x_mm: config.midline_x_mm,
        base_fit_enabled: config.base_fit_enabled,
        base_offset_mm: config.base_offset_mm,
    };
    let packaged = package(&config.mesh, &options)?;
    tracing::info!(case_id = %packaged.case_id, mesh = %config.mesh.display(), "Case packaged");

    let api = ApiClient::new(&config.api_url);
    let receipt = api.submit(&packaged).await?;
    tracing::info!(case_id = %receipt.case_id, job_id = %receipt.job_id, "Case submitted");

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let outcome = poll_case(
        &api,
        &receipt.case_id,
        config.poll_interval,
        config.poll_max_attempts,
        &cancel,
    )
    .await?;

    match outcome {
        PollOutcome::Succeeded(artifacts) => {
            for link in &artifacts {
                let dest = config.out_dir.join(&link.name);
                api.download_artifact(link, &dest).await?;
                tracing::info!(artifact = %link.name, dest = %dest.display(), "Artifact downloaded");
            }
            Ok(ExitCode::SUCCESS)
        }
        PollOutcome::Failed(detail) => {
            tracing::error!(case_id = %receipt.case_id, detail = %detail, "Case failed");
            Ok(ExitCode::FAILURE)
        }
        PollOutcome::Pending => {
            tracing::warn!(
                case_id = %receipt.case_id,
                "Case still in flight after the polling bound; try again later"
            );
            Ok(ExitCode::FAILURE)
        }
        PollOutcome::Cancelled => {
            tracing::info!(case_id = %receipt.case_id, "Polling cancelled");
            Ok(ExitCode::FAILURE)
        }
    }
}
