pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the public route tree.
///
/// ```text
/// POST /upload                  submit a case archive
/// GET  /download/{case_id}      status + artifact links
/// GET  /healthz                 liveness
/// /artifacts/*                  produced files (static)
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(handlers::upload::upload_case))
        .route("/download/{case_id}", get(handlers::download::download_status))
        .merge(health::router())
}
