//! Client side of the fulfillment pipeline: package a scan into a case
//! archive, submit it, poll for the outcome, and fetch the produced
//! artifacts.
//!
//! The binary wires these together into the full package → upload → poll
//! → download flow; the library pieces are independently usable.

pub mod api;
pub mod config;
pub mod error;
pub mod packager;
pub mod poll;

pub use error::ClientError;
