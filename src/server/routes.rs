use axum::{Json, extract::State};
use serde::Serialize;

use super::error::AppError;
use crate::monitor::{Monitor, Outcome};
use crate::probe::ProbeResult;

/// Body returned by every summarizing endpoint
#[derive(Debug, Serialize)]
pub struct SummaryBody {
    pub success: bool,
    pub analysis: String,
    pub digest: String,
    /// Saved report file name, absent when saving failed
    pub filename: Option<String>,
    pub warning: Option<String>,
    pub timestamp: String,
}

impl From<Outcome> for SummaryBody {
    fn from(outcome: Outcome) -> Self {
        Self {
            success: true,
            analysis: outcome.summary,
            digest: outcome.digest.into_string(),
            filename: outcome
                .report_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            warning: outcome.warning,
            timestamp: outcome.generated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeView {
    pub title: String,
    #[serde(flatten)]
    pub result: ProbeResult,
}

/// Raw cluster snapshot.
///
/// `status`, `describe` and `logs` hold the output of the first, second
/// and third configured cluster probe; `probes` has all of them.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: String,
    pub describe: String,
    pub logs: String,
    pub errors: String,
    pub probes: Vec<ProbeView>,
}

/// GET /api/status: raw output of the cluster probes
pub async fn status(State(monitor): State<Monitor>) -> Result<Json<StatusBody>, AppError> {
    let aggregate = monitor.cluster_status().await?;
    let stdout_at = |i: usize| aggregate.results.get(i).map(|r| r.stdout.clone()).unwrap_or_default();

    let errors = aggregate
        .results
        .iter()
        .filter(|r| !r.stderr.trim().is_empty())
        .map(|r| r.stderr.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    let specs = &monitor.config().probes.cluster;
    let body = StatusBody {
        status: stdout_at(0),
        describe: stdout_at(1),
        logs: stdout_at(2),
        errors,
        probes: specs
            .iter()
            .zip(aggregate.results.iter())
            .map(|(spec, result)| ProbeView {
                title: spec.display_title().to_string(),
                result: result.clone(),
            })
            .collect(),
    };
    Ok(Json(body))
}

/// POST /api/analyze: summarize cluster health
pub async fn analyze(State(monitor): State<Monitor>) -> Result<Json<SummaryBody>, AppError> {
    let outcome = monitor.collect_cluster_snapshot().await?;
    Ok(Json(outcome.into()))
}

/// POST /api/scan: run the vulnerability scan and summarize it
pub async fn scan(State(monitor): State<Monitor>) -> Result<Json<SummaryBody>, AppError> {
    let outcome = monitor.collect_vulnerability_report().await?;
    Ok(Json(outcome.into()))
}

/// POST /api/bruteforce: run the login brute-force test and summarize it
pub async fn bruteforce(State(monitor): State<Monitor>) -> Result<Json<SummaryBody>, AppError> {
    let outcome = monitor.collect_brute_force_attempt().await?;
    Ok(Json(outcome.into()))
}
