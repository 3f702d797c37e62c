//! Shared test harness: the app router wired to the memory backend, plus
//! request/response helpers.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vestra_api::config::ServerConfig;
use vestra_api::router::build_app_router;
use vestra_api::state::AppState;
use vestra_core::archive::CaseArchive;
use vestra_core::manifest::{BaseFit, HealthySide, Manifest, Midline, MANIFEST_VERSION, UNITS_MM};
use vestra_db::memory::{MemoryQueue, MemoryStore};

/// Build a test `ServerConfig` rooted at a scratch data directory.
pub fn test_config(data_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_mb: 64,
        data_dir: data_dir.to_path_buf(),
    }
}

/// The app under test plus direct handles on its store and queue.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
}

/// Build the full application router with all middleware layers on the
/// memory backend, mirroring the production router construction.
pub fn build_test_app(data_dir: &Path) -> TestApp {
    let config = test_config(data_dir);
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::default());

    let state = AppState {
        store: Arc::clone(&store) as Arc<dyn vestra_core::store::CaseStore>,
        queue: Arc::clone(&queue) as Arc<dyn vestra_core::store::JobQueue>,
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        queue,
    }
}

/// Issue a GET request against the router.
pub async fn get(router: Router, uri: &str) -> Response<Body> {
    router
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request should not fail at the transport level")
}

/// Multipart boundary used by [`post_archive`].
const BOUNDARY: &str = "vestra-test-boundary";

/// POST an archive (or arbitrary bytes) as the `archive` multipart field.
pub async fn post_archive(router: Router, bytes: &[u8]) -> Response<Body> {
    post_multipart(router, "archive", bytes).await
}

/// POST arbitrary bytes under an arbitrary multipart field name.
pub async fn post_multipart(router: Router, field: &str, bytes: &[u8]) -> Response<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"case.zip\"\r\n\
             Content-Type: application/zip\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request build"),
        )
        .await
        .expect("request should not fail at the transport level")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Assert status and return the JSON body in one step.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

/// A valid manifest for test submissions.
pub fn manifest(case_id: &str) -> Manifest {
    Manifest {
        schema_version: MANIFEST_VERSION.to_string(),
        units: UNITS_MM.to_string(),
        case_id: case_id.to_string(),
        healthy_side: HealthySide::Left,
        midline: Midline {
            point: [5.0, 0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
        },
        base_fit: BaseFit {
            enabled: true,
            offset_mm: 2.0,
        },
    }
}

/// A packed, valid case archive for test submissions.
pub fn packed_archive(case_id: &str) -> Vec<u8> {
    CaseArchive::new(b"solid fake-scan".to_vec(), manifest(case_id))
        .pack()
        .expect("pack test archive")
}
