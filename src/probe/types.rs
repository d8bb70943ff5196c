//! Probe data model: what to run, and what came back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default probe timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

/// One external diagnostic command, as declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Identifier, unique within a probe set
    pub name: String,
    /// Section heading used in digests; falls back to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Executable followed by its arguments (no shell involved)
    pub command: Vec<String>,
    /// Timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProbeSpec {
    /// Create a probe spec with the default timeout
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            title: None,
            command: command.into_iter().map(Into::into).collect(),
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }

    /// Set the digest section heading
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Heading for this probe's digest section
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Command line rendered for logs
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Why a probe did not complete cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// Deadline hit; the process was killed
    Timeout { after_ms: u64 },
    /// Process exited unsuccessfully; `None` means it was killed by a signal
    NonZeroExit { code: Option<i32> },
    /// Process could not be started or waited on
    Spawn { reason: String },
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Timeout { after_ms } => write!(f, "timed out after {}ms", after_ms),
            ProbeFailure::NonZeroExit { code: Some(code) } => write!(f, "exited with code {}", code),
            ProbeFailure::NonZeroExit { code: None } => write!(f, "killed by signal"),
            ProbeFailure::Spawn { reason } => write!(f, "failed to start: {}", reason),
        }
    }
}

/// Outcome of running one probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_error: Option<ProbeFailure>,
    pub duration_ms: u64,
    /// Output went past the capture limit and was cut
    #[serde(default)]
    pub truncated: bool,
}

impl ProbeResult {
    /// A clean run
    pub fn success(name: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stdout: stdout.into(),
            stderr: String::new(),
            exit_error: None,
            duration_ms: 0,
            truncated: false,
        }
    }

    /// A failed run with no captured output
    pub fn failed(name: impl Into<String>, failure: ProbeFailure) -> Self {
        Self {
            name: name.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_error: Some(failure),
            duration_ms: 0,
            truncated: false,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_failure(mut self, failure: ProbeFailure) -> Self {
        self.exit_error = Some(failure);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_error.is_none()
    }

    /// Primary output is present
    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty()
    }

    /// Failed and left nothing worth summarizing
    pub fn is_unusable(&self) -> bool {
        !self.is_success() && !self.has_output()
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.exit_error, Some(ProbeFailure::Timeout { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_spec_new() {
        let spec = ProbeSpec::new("pods", ["kubectl", "get", "pods"]);
        assert_eq!(spec.name, "pods");
        assert_eq!(spec.command, vec!["kubectl", "get", "pods"]);
        assert_eq!(spec.timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);
        assert_eq!(spec.display_title(), "pods");
        assert_eq!(spec.command_line(), "kubectl get pods");
    }

    #[test]
    fn test_probe_spec_builder() {
        let spec = ProbeSpec::new("pods", ["kubectl"]).title("Pod Status").timeout_ms(500);
        assert_eq!(spec.display_title(), "Pod Status");
        assert_eq!(spec.timeout_ms, 500);
    }

    #[test]
    fn test_probe_spec_yaml_default_timeout() {
        let spec: ProbeSpec = serde_yaml::from_str("name: logs\ncommand: [kubectl, logs]\n").unwrap();
        assert_eq!(spec.timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);
        assert!(spec.title.is_none());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(ProbeFailure::Timeout { after_ms: 250 }.to_string(), "timed out after 250ms");
        assert_eq!(ProbeFailure::NonZeroExit { code: Some(1) }.to_string(), "exited with code 1");
        assert_eq!(ProbeFailure::NonZeroExit { code: None }.to_string(), "killed by signal");
        assert!(
            ProbeFailure::Spawn { reason: "not found".into() }
                .to_string()
                .contains("not found")
        );
    }

    #[test]
    fn test_failure_serialization() {
        let json = serde_json::to_value(ProbeFailure::Timeout { after_ms: 10 }).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["after_ms"], 10);
    }

    #[test]
    fn test_usability() {
        let ok = ProbeResult::success("a", "pod-a 1/1 Running");
        assert!(ok.is_success());
        assert!(!ok.is_unusable());

        let empty_ok = ProbeResult::success("b", "");
        assert!(!empty_ok.has_output());
        assert!(!empty_ok.is_unusable());

        let partial = ProbeResult::success("c", "some logs").with_failure(ProbeFailure::NonZeroExit { code: Some(1) });
        assert!(!partial.is_unusable());

        let dead = ProbeResult::failed("d", ProbeFailure::NonZeroExit { code: Some(1) }).with_stderr("boom");
        assert!(dead.is_unusable());
    }

    #[test]
    fn test_timed_out() {
        assert!(ProbeResult::failed("a", ProbeFailure::Timeout { after_ms: 1 }).timed_out());
        assert!(!ProbeResult::success("a", "x").timed_out());
    }
}
