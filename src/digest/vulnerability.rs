//! Vulnerability scanner report model and its risk-ordered digest
//!
//! The scanner writes a JSON report of sites, each carrying a list of
//! alerts. Numeric fields arrive as strings in some report versions, so
//! both spellings are accepted.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;

use super::{Digest, clip};
use crate::error::{Result, ScopeError};

const DESCRIPTION_CHARS: usize = 300;
const SOLUTION_CHARS: usize = 200;

/// Scanner risk code 0-3
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Informational,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low, RiskLevel::Informational];

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RiskLevel::Informational),
            1 => Some(RiskLevel::Low),
            2 => Some(RiskLevel::Medium),
            3 => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Informational => "Informational",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(u64),
    Text(String),
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Number(n) => Ok(n),
        Lenient::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn risk_level<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<RiskLevel, D::Error> {
    let code = lenient_u64(deserializer)?;
    RiskLevel::from_code(code).ok_or_else(|| serde::de::Error::custom(format!("risk code {} out of range 0-3", code)))
}

/// One finding reported by the scanner
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    alert: Option<String>,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub solution: String,
    #[serde(rename = "riskcode", deserialize_with = "risk_level")]
    pub risk: RiskLevel,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub count: u64,
}

impl Alert {
    pub fn new(name: impl Into<String>, risk: RiskLevel, count: u64) -> Self {
        Self {
            name: Some(name.into()),
            alert: None,
            description: String::new(),
            solution: String::new(),
            risk,
            count,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Alert title; newer reports use `name`, older ones `alert`
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .or(self.alert.as_deref())
            .unwrap_or("Unnamed alert")
    }
}

/// One scanned target
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Site {
    #[serde(default, rename = "@name")]
    pub name: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// Parsed scanner report
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VulnerabilityReport {
    #[serde(default, rename = "site")]
    pub sites: Vec<Site>,
}

impl VulnerabilityReport {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a report file from the shared mount
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScopeError::ReportUnavailable(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
            .map_err(|e| ScopeError::ReportUnavailable(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// All alerts across sites, highest risk first.
    ///
    /// Ties break on instance count (more first) and then title, and the
    /// sort is stable, so the order does not depend on report order.
    pub fn ranked_alerts(&self) -> Vec<&Alert> {
        let mut alerts: Vec<&Alert> = self.sites.iter().flat_map(|s| s.alerts.iter()).collect();
        alerts.sort_by(|a, b| {
            b.risk
                .cmp(&a.risk)
                .then(b.count.cmp(&a.count))
                .then_with(|| a.title().cmp(b.title()))
        });
        alerts
    }

    pub fn count_at(&self, risk: RiskLevel) -> usize {
        self.sites
            .iter()
            .flat_map(|s| s.alerts.iter())
            .filter(|a| a.risk == risk)
            .count()
    }

    pub fn total_alerts(&self) -> usize {
        self.sites.iter().map(|s| s.alerts.len()).sum()
    }
}

/// Drop markup tags and collapse whitespace
fn strip_html(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                plain.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the vulnerability digest: totals, then the top `max_findings`
/// alerts by risk, bounded by `budget` characters.
pub fn vulnerability_digest(report: &VulnerabilityReport, max_findings: usize, budget: usize) -> Digest {
    let ranked = report.ranked_alerts();
    let shown = ranked.len().min(max_findings);

    let mut lines = Vec::new();
    let targets: Vec<&str> = report
        .sites
        .iter()
        .map(|s| s.name.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    if !targets.is_empty() {
        lines.push(format!("Targets: {}", targets.join(", ")));
    }

    let totals: Vec<String> = RiskLevel::ALL
        .iter()
        .map(|r| format!("{}: {}", r, report.count_at(*r)))
        .collect();
    lines.push(format!(
        "Alerts: {} total ({}); showing top {}",
        report.total_alerts(),
        totals.join(", "),
        shown
    ));
    lines.push(String::new());

    if ranked.is_empty() {
        lines.push("No alerts reported.".to_string());
    }

    for alert in ranked.iter().take(shown) {
        let description = strip_html(&alert.description);
        let mut line = format!("- [{}] {} (instances: {})", alert.risk, alert.title(), alert.count);
        if !description.is_empty() {
            line.push_str(": ");
            line.push_str(&clip(&description, DESCRIPTION_CHARS));
        }
        let solution = strip_html(&alert.solution);
        if !solution.is_empty() {
            line.push_str("\n  Fix: ");
            line.push_str(&clip(&solution, SOLUTION_CHARS));
        }
        lines.push(line);
    }

    if ranked.len() > shown {
        lines.push(format!("({} lower-ranked alerts omitted)", ranked.len() - shown));
    }

    Digest::new(clip(&lines.join("\n"), budget))
}
