//! Digests - bounded textual extracts handed to the summarizer
//!
//! Every builder here is deterministic and never produces more characters
//! than the budget it was given.

pub mod bruteforce;
pub mod cluster;
pub mod vulnerability;

use serde::Serialize;
use std::fmt;

pub use bruteforce::bruteforce_digest;
pub use cluster::cluster_digest;
pub use vulnerability::{Alert, RiskLevel, Site, VulnerabilityReport, vulnerability_digest};

const HEAD_MARKER: &str = "\n[... truncated]";
const TAIL_MARKER: &str = "[... earlier output omitted]\n";

/// Bounded text extracted from probe output or a structured report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size in characters
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep the head of `text`, at most `max_chars` characters including the marker
pub fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker_len = HEAD_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }
    let mut clipped: String = text.chars().take(max_chars - marker_len).collect();
    clipped.push_str(HEAD_MARKER);
    clipped
}

/// Keep the tail of `text`, at most `max_chars` characters including the marker
pub fn clip_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let marker_len = TAIL_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().skip(total - max_chars).collect();
    }
    let keep = max_chars - marker_len;
    let mut clipped = TAIL_MARKER.to_string();
    clipped.extend(text.chars().skip(total - keep));
    clipped
}
