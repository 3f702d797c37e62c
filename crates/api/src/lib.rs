//! HTTP intake and resolution service for the Vestra fulfillment pipeline.
//!
//! Two real endpoints (archive upload and case status/download) plus a
//! health check and static artifact serving. Handlers are stateless;
//! everything durable lives behind the injected store and queue.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
