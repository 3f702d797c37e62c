//! Fulfillment worker: drains the job queue, runs the external geometry
//! processor per case, and records the outcome.
//!
//! The binary has two modes. The default mode runs [`runner::WorkerLoop`]
//! against the shared store and queue until shutdown. When `VESTRA_INPUT`
//! is set, [`single_shot`] instead performs exactly one processor
//! invocation from environment parameters and exits, with no server or
//! queue involved.

pub mod config;
pub mod runner;
pub mod single_shot;
