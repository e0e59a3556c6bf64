//! FxLab run orchestration.
//!
//! Wires the core engine together per run configuration — replayer into the
//! market-data fan-out, venue simulator into the positions fan-out, strategy
//! behind the caches — then dispatches to exhaustion and reports a summary.

pub mod config;
pub mod fingerprint;
pub mod runner;
pub mod strategies;
pub mod synthetic;

pub use config::{ConfigError, RunConfig};
pub use runner::{run, run_stream, run_with_sink, RunSummary, Sink};
