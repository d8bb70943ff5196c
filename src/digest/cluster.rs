//! Cluster snapshot digest: one section per probe plus collected stderr

use super::{Digest, clip};
use crate::probe::{AggregateResult, ProbeResult, ProbeSpec};

const ERRORS_HEADING: &str = "Errors (if any)";

fn section_title<'a>(specs: &'a [ProbeSpec], result: &'a ProbeResult) -> &'a str {
    specs
        .iter()
        .find(|s| s.name == result.name)
        .map(ProbeSpec::display_title)
        .unwrap_or(result.name.as_str())
}

fn status_markers(result: &ProbeResult) -> Vec<String> {
    let mut markers = Vec::new();
    if let Some(failure) = &result.exit_error {
        markers.push(format!("[{}]", failure));
    }
    if result.truncated {
        markers.push("[output truncated]".to_string());
    }
    markers
}

/// Build the cluster digest for `aggregate`, bounded by `budget` characters.
///
/// Every probe section and the error section get an equal share of the
/// budget so one noisy command cannot crowd out the others.
pub fn cluster_digest(specs: &[ProbeSpec], aggregate: &AggregateResult, budget: usize) -> Digest {
    let share = budget / (aggregate.len() + 1).max(1);
    let mut sections = Vec::with_capacity(aggregate.len() + 1);

    for result in &aggregate.results {
        let body = if result.has_output() {
            clip(result.stdout.trim_end(), share)
        } else {
            "(no output)".to_string()
        };
        let mut section = format!("## {}\n{}", section_title(specs, result), body);
        for marker in status_markers(result) {
            section.push('\n');
            section.push_str(&marker);
        }
        sections.push(section);
    }

    let errors: Vec<String> = aggregate
        .results
        .iter()
        .filter(|r| !r.stderr.trim().is_empty())
        .map(|r| format!("### {}\n{}", section_title(specs, r), r.stderr.trim_end()))
        .collect();
    let errors_body = if errors.is_empty() {
        "(none)".to_string()
    } else {
        clip(&errors.join("\n"), share)
    };
    sections.push(format!("## {}\n{}", ERRORS_HEADING, errors_body));

    Digest::new(clip(&sections.join("\n\n"), budget))
}
