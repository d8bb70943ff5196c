//! Monitor: the request-level pipelines behind every surface
//!
//! Built once at startup from configuration and injected collaborators.
//! Every method is one independent request. The only shared state is the
//! lock that keeps vulnerability scans from clobbering each other's report.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{Config, LlmConfig};
use crate::digest::{Digest, VulnerabilityReport, bruteforce_digest, cluster_digest, vulnerability_digest};
use crate::error::{Result, ScopeError};
use crate::llm::{LlmClient, OpenAiClient, OpenAiConfig};
use crate::probe::{AggregateResult, Aggregator, CommandRunner, ProbeRunner, ProbeSpec};
use crate::report::{ReportWriter, SummaryArtifact};
use crate::summarizer::{PromptProfile, Summarizer};

/// Result of one summarization request
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub profile: PromptProfile,
    pub summary: String,
    pub digest: Digest,
    /// Where the report was saved, if it was
    pub report_path: Option<PathBuf>,
    /// Non-fatal problem, such as a report that could not be saved
    pub warning: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Per-request limits such as `max_tokens` come from the prompt profile
fn client_config(llm: &LlmConfig) -> OpenAiConfig {
    OpenAiConfig {
        endpoint: llm.endpoint.clone(),
        model: llm.model.clone(),
        timeout: Duration::from_millis(llm.timeout_ms),
        ..OpenAiConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct Monitor {
    aggregator: Aggregator,
    summarizer: Summarizer,
    writer: ReportWriter,
    config: Arc<Config>,
    /// Scans share one report file on the host; one at a time
    scan_lock: Arc<Mutex<()>>,
}

impl Monitor {
    pub fn new(config: Config, runner: Arc<dyn ProbeRunner>, client: Arc<dyn LlmClient>) -> Self {
        Self {
            aggregator: Aggregator::new(runner),
            summarizer: Summarizer::new(client, config.profiles.clone()),
            writer: ReportWriter::new(config.reports.dir.clone()),
            config: Arc::new(config),
            scan_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wire up the process runner and the configured completion client
    pub fn from_config(config: Config) -> Result<Self> {
        let client = OpenAiClient::from_env(&config.llm.token_env, client_config(&config.llm))?;
        let runner = CommandRunner::new(config.probes.max_output_bytes);
        Ok(Self::new(config, Arc::new(runner), Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw cluster snapshot, no summarization
    pub async fn cluster_status(&self) -> Result<AggregateResult> {
        self.aggregator.run_all(&self.config.probes.cluster).await.into_usable()
    }

    /// Probe the cluster, summarize its health and save the report
    pub async fn collect_cluster_snapshot(&self) -> Result<Outcome> {
        let profile = PromptProfile::ClusterHealth;
        self.ensure_ready()?;
        let specs = &self.config.probes.cluster;
        let aggregate = self.aggregator.run_all(specs).await.into_usable()?;
        let digest = cluster_digest(specs, &aggregate, self.budget(profile));
        self.summarize_and_save(digest, profile).await
    }

    /// Run the vulnerability scanner, summarize its report and save it
    pub async fn collect_vulnerability_report(&self) -> Result<Outcome> {
        let profile = PromptProfile::VulnerabilityReport;
        self.ensure_ready()?;
        let scan = &self.config.scan;
        let guard = self.scan_lock.lock().await;

        // a report left by an earlier run must not pass for this one
        match tokio::fs::remove_file(&scan.report_path).await {
            Ok(()) => info!("Removed stale report {}", scan.report_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove stale report {}: {}", scan.report_path.display(), e),
        }

        let aggregate = self.aggregator.run_all(std::slice::from_ref(&scan.probe)).await;
        let report = VulnerabilityReport::load(&scan.report_path).await.map_err(|e| match e {
            ScopeError::ReportUnavailable(reason) => {
                let scanner_state = aggregate
                    .results
                    .first()
                    .and_then(|r| r.exit_error.as_ref())
                    .map(|f| format!(" (scanner {})", f))
                    .unwrap_or_default();
                ScopeError::ReportUnavailable(format!("{}{}", reason, scanner_state))
            }
            other => other,
        })?;
        drop(guard);

        let digest = vulnerability_digest(&report, scan.max_findings, self.budget(profile));
        self.summarize_and_save(digest, profile).await
    }

    /// Run the credential brute-force test, summarize it and save the report
    pub async fn collect_brute_force_attempt(&self) -> Result<Outcome> {
        let profile = PromptProfile::AuthBruteForce;
        self.ensure_ready()?;
        let specs: &[ProbeSpec] = std::slice::from_ref(&self.config.bruteforce.probe);
        let aggregate = self.aggregator.run_all(specs).await.into_usable()?;
        let digest = bruteforce_digest(&aggregate, self.budget(profile));
        self.summarize_and_save(digest, profile).await
    }

    /// Probes can run for minutes; refuse up front when no summary is possible
    fn ensure_ready(&self) -> Result<()> {
        if self.summarizer.is_ready() {
            Ok(())
        } else {
            Err(ScopeError::MissingCredential(format!(
                "{} is not set",
                self.config.llm.token_env
            )))
        }
    }

    fn budget(&self, profile: PromptProfile) -> usize {
        self.config.profiles.get(profile).max_digest_chars
    }

    async fn summarize_and_save(&self, digest: Digest, profile: PromptProfile) -> Result<Outcome> {
        let summary = self.summarizer.summarize(&digest, profile).await?;
        let artifact = SummaryArtifact::new(profile.title(), profile.slug(), digest, summary);

        let (report_path, warning) = match self.writer.write(&artifact).await {
            Ok(path) => (Some(path), None),
            Err(e) if e.is_warning() => {
                warn!("Summary not saved: {}", e);
                (None, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        Ok(Outcome {
            profile,
            summary: artifact.generated_text,
            digest: artifact.digest,
            report_path,
            warning,
            generated_at: artifact.created_at,
        })
    }
}
