//! Probes - external diagnostic commands and their concurrent aggregation
//!
//! This module provides:
//! - ProbeSpec / ProbeResult data types
//! - ProbeRunner trait and the process-backed CommandRunner
//! - Aggregator for running a probe set with a structured join

pub mod aggregator;
pub mod runner;
pub mod types;

pub use aggregator::{AggregateResult, Aggregator};
pub use runner::{CommandRunner, DEFAULT_MAX_OUTPUT_BYTES, ProbeRunner};
pub use types::{DEFAULT_PROBE_TIMEOUT_MS, ProbeFailure, ProbeResult, ProbeSpec};
