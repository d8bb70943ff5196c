//! Brute-force transcript digest
//!
//! The tool's output has no structure; results are printed last, so the
//! transcript keeps its tail when it has to be cut.

use super::{Digest, clip, clip_tail};
use crate::probe::AggregateResult;

fn is_credential_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("login:") && lower.contains("password:")
}

/// Build the brute-force digest, bounded by `budget` characters
pub fn bruteforce_digest(aggregate: &AggregateResult, budget: usize) -> Digest {
    let mut transcript = Vec::new();
    let mut status = Vec::new();

    for result in &aggregate.results {
        if let Some(failure) = &result.exit_error {
            status.push(format!("[{}: {}]", result.name, failure));
        }
        if !result.stdout.trim().is_empty() {
            transcript.push(result.stdout.trim_end().to_string());
        }
        if !result.stderr.trim().is_empty() {
            transcript.push(format!("STDERR:\n{}", result.stderr.trim_end()));
        }
    }
    let transcript = transcript.join("\n");

    let found: Vec<String> = transcript
        .lines()
        .filter(|l| is_credential_line(l))
        .map(|l| format!("- {}", l.trim()))
        .collect();

    let mut head = String::from("## Found credentials\n");
    if found.is_empty() {
        head.push_str("none reported");
    } else {
        head.push_str(&clip(&found.join("\n"), budget / 2));
    }
    for line in &status {
        head.push('\n');
        head.push_str(line);
    }
    head.push_str("\n\n## Transcript\n");

    let body = if transcript.is_empty() {
        "(no output)".to_string()
    } else {
        let room = budget.saturating_sub(head.chars().count());
        clip_tail(&transcript, room)
    };

    Digest::new(clip(&format!("{}{}", head, body), budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeFailure, ProbeResult};

    #[test]
    fn test_found_credentials_hoisted() {
        let stdout = "Hydra v9.5 starting\n[DATA] attacking http-post-form://target:3000/\n\
                      [3000][http-post-form] host: target   login: admin   password: admin123\n\
                      1 of 1 target successfully completed, 1 valid password found";
        let aggregate = AggregateResult::from_results(vec![ProbeResult::success("hydra", stdout)]);
        let text = bruteforce_digest(&aggregate, 5_000).into_string();

        assert!(text.starts_with("## Found credentials\n- [3000][http-post-form] host: target"));
        assert!(text.contains("password: admin123"));
        assert!(text.contains("## Transcript\nHydra v9.5 starting"));
    }

    #[test]
    fn test_nothing_found() {
        let aggregate = AggregateResult::from_results(vec![
            ProbeResult::success("hydra", "0 valid passwords found").with_stderr("[WARNING] slow target"),
        ]);
        let text = bruteforce_digest(&aggregate, 5_000).into_string();
        assert!(text.contains("none reported"));
        assert!(text.contains("STDERR:\n[WARNING] slow target"));
    }

    #[test]
    fn test_failure_status_line() {
        let aggregate = AggregateResult::from_results(vec![
            ProbeResult::success("hydra", "partial run").with_failure(ProbeFailure::Timeout { after_ms: 1000 }),
        ]);
        let text = bruteforce_digest(&aggregate, 5_000).into_string();
        assert!(text.contains("[hydra: timed out after 1000ms]"));
    }

    #[test]
    fn test_tail_kept_within_budget() {
        let mut stdout = "[ATTEMPT] noise\n".repeat(1_000);
        stdout.push_str("1 of 1 target completed, 0 valid password found");
        let aggregate = AggregateResult::from_results(vec![ProbeResult::success("hydra", stdout)]);
        let digest = bruteforce_digest(&aggregate, 800);

        assert!(digest.char_len() <= 800);
        assert!(digest.as_str().ends_with("0 valid password found"));
        assert!(digest.as_str().contains("[... earlier output omitted]"));
    }

    #[test]
    fn test_empty_output() {
        let aggregate = AggregateResult::from_results(vec![ProbeResult::success("hydra", "")]);
        let text = bruteforce_digest(&aggregate, 500).into_string();
        assert!(text.ends_with("(no output)"));
    }
}
