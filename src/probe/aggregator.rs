//! Aggregator: fan a probe set out, join every result back in order

use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::runner::ProbeRunner;
use super::types::{ProbeResult, ProbeSpec};
use crate::error::{Result, ScopeError};

/// Joined results of one probe set, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub results: Vec<ProbeResult>,
    /// Set only when every probe failed without usable output
    pub overall_error: Option<String>,
}

impl AggregateResult {
    /// Fold positional results and decide whether anything is usable
    pub fn from_results(results: Vec<ProbeResult>) -> Self {
        let overall_error = if !results.is_empty() && results.iter().all(ProbeResult::is_unusable) {
            let reasons: Vec<String> = results
                .iter()
                .map(|r| match &r.exit_error {
                    Some(failure) => format!("{}: {}", r.name, failure),
                    None => r.name.clone(),
                })
                .collect();
            Some(reasons.join("; "))
        } else {
            None
        };

        Self { results, overall_error }
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Turn an all-failed aggregate into a terminal error
    pub fn into_usable(self) -> Result<Self> {
        match self.overall_error {
            Some(reason) => Err(ScopeError::AllProbesFailed(reason)),
            None => Ok(self),
        }
    }
}

/// Runs probe sets concurrently through a shared runner
#[derive(Clone)]
pub struct Aggregator {
    runner: Arc<dyn ProbeRunner>,
}

impl Aggregator {
    pub fn new(runner: Arc<dyn ProbeRunner>) -> Self {
        Self { runner }
    }

    /// Run every spec at once and wait for all of them.
    ///
    /// One slow or failing probe never cancels its siblings, and results
    /// are positional, so completion order does not matter.
    pub async fn run_all(&self, specs: &[ProbeSpec]) -> AggregateResult {
        let started = Instant::now();
        debug!("Running {} probes", specs.len());

        let results = join_all(specs.iter().map(|spec| self.runner.run(spec))).await;
        let aggregate = AggregateResult::from_results(results);

        match &aggregate.overall_error {
            Some(reason) => warn!("All {} probes failed: {}", aggregate.len(), reason),
            None => info!(
                "Probes complete: {} run, {} failed, {}ms",
                aggregate.len(),
                aggregate.failed_count(),
                started.elapsed().as_millis()
            ),
        }

        aggregate
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}
