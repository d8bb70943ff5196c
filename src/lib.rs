//! Clusterscope - cluster and workload health reports
//!
//! Runs diagnostic probes against a Kubernetes workload (status queries,
//! a web vulnerability scan, a login brute-force test), condenses their
//! output into bounded digests, has a language model summarize them and
//! keeps every summary as a timestamped markdown report.

pub mod config;
pub mod digest;
pub mod error;
pub mod llm;
pub mod monitor;
pub mod probe;
pub mod report;
pub mod server;
pub mod summarizer;

pub use error::{Result, ScopeError};
