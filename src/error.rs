//! Error types for clusterscope
//!
//! Centralized error handling using thiserror. Probe-level failures are not
//! errors here; they travel as data inside `ProbeResult`.

use thiserror::Error;

/// All error types that can terminate a clusterscope request
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Every probe in the set failed and none produced usable output
    #[error("All probes failed: {0}")]
    AllProbesFailed(String),

    /// No API token configured for the completion service
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Completion service unavailable, rejected the request, or returned nothing
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Digest is over the profile's size bound
    #[error("Digest too large: {size} chars exceeds limit of {limit}")]
    DigestTooLarge { size: usize, limit: usize },

    /// Report artifact could not be persisted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Scanner report missing or unreadable
    #[error("Report unavailable: {0}")]
    ReportUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScopeError {
    /// Whether the request can still succeed with this error downgraded to a warning
    pub fn is_warning(&self) -> bool {
        matches!(self, ScopeError::Storage(_))
    }
}

/// Result type alias for clusterscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_probes_failed_error() {
        let err = ScopeError::AllProbesFailed("pod-status: timed out".to_string());
        assert_eq!(err.to_string(), "All probes failed: pod-status: timed out");
    }

    #[test]
    fn test_missing_credential_error() {
        let err = ScopeError::MissingCredential("GITHUB_TOKEN not set".to_string());
        assert_eq!(err.to_string(), "Missing credential: GITHUB_TOKEN not set");
    }

    #[test]
    fn test_digest_too_large_error() {
        let err = ScopeError::DigestTooLarge { size: 120, limit: 100 };
        assert_eq!(err.to_string(), "Digest too large: 120 chars exceeds limit of 100");
    }

    #[test]
    fn test_storage_is_warning() {
        assert!(ScopeError::Storage("disk full".to_string()).is_warning());
        assert!(!ScopeError::Upstream("503".to_string()).is_warning());
        assert!(!ScopeError::AllProbesFailed("x".to_string()).is_warning());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ScopeError = io_err.into();
        assert!(matches!(err, ScopeError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ScopeError = json_err.into();
        assert!(matches!(err, ScopeError::Json(_)));
    }
}
