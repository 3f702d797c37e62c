//! Shared domain types for the Vestra fulfillment pipeline.
//!
//! Everything that crosses a crate boundary lives here: the case manifest,
//! the archive codec, the job model, the store/queue trait seams, and the
//! derivation of external-processor invocations from manifest parameters.

pub mod archive;
pub mod error;
pub mod invocation;
pub mod job;
pub mod manifest;
pub mod store;
