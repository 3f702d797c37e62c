use std::sync::Arc;

use vestra_core::store::{CaseStore, JobQueue};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; the store and queue are trait objects so production
/// (PostgreSQL) and tests (memory backend) share the same handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CaseStore>,
    pub queue: Arc<dyn JobQueue>,
    pub config: Arc<ServerConfig>,
}
