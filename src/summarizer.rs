//! Summarizer: ships a digest to the completion service under a fixed
//! per-profile prompt and budget.
//!
//! One call per request, no retries. Credential and size checks happen
//! before anything goes over the network.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::ProfilesConfig;
use crate::digest::Digest;
use crate::error::{Result, ScopeError};
use crate::llm::{CompletionRequest, LlmClient};

/// What kind of material is being summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptProfile {
    ClusterHealth,
    VulnerabilityReport,
    AuthBruteForce,
}

impl PromptProfile {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            PromptProfile::ClusterHealth => {
                "You are a Kubernetes expert. Analyze the provided cluster information and give insights \
                 about the pods' names, health, performance, and any issues. Format your response in markdown."
            }
            PromptProfile::VulnerabilityReport => {
                "You are an application security expert. Summarize the web vulnerability scan findings \
                 below, most severe first: explain each issue, its likely impact, and concrete remediation \
                 steps. Format your response in markdown."
            }
            PromptProfile::AuthBruteForce => {
                "You are a penetration tester reviewing the output of an authorized credential brute-force \
                 test against a login form. Report whether any credentials were found, what the result says \
                 about the login's resistance to guessing, and recommended mitigations such as rate limiting \
                 and account lockout. Format your response in markdown."
            }
        }
    }

    /// Sentence placed before the digest in the user message
    pub fn lead_in(&self) -> &'static str {
        match self {
            PromptProfile::ClusterHealth => "Analyze my pod status:",
            PromptProfile::VulnerabilityReport => "Summarize this vulnerability scan:",
            PromptProfile::AuthBruteForce => "Review this brute-force test output:",
        }
    }

    /// Report heading
    pub fn title(&self) -> &'static str {
        match self {
            PromptProfile::ClusterHealth => "Cluster Health Analysis",
            PromptProfile::VulnerabilityReport => "Vulnerability Scan Summary",
            PromptProfile::AuthBruteForce => "Brute-Force Test Review",
        }
    }

    /// File name prefix for persisted reports
    pub fn slug(&self) -> &'static str {
        match self {
            PromptProfile::ClusterHealth => "cluster-analysis",
            PromptProfile::VulnerabilityReport => "vulnerability-scan",
            PromptProfile::AuthBruteForce => "bruteforce-review",
        }
    }
}

impl fmt::Display for PromptProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Summarizes digests through an injected LLM client
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn LlmClient>,
    profiles: ProfilesConfig,
}

impl Summarizer {
    pub fn new(client: Arc<dyn LlmClient>, profiles: ProfilesConfig) -> Self {
        Self { client, profiles }
    }

    /// Whether the completion service has a credential
    pub fn is_ready(&self) -> bool {
        self.client.is_ready()
    }

    pub fn profiles(&self) -> &ProfilesConfig {
        &self.profiles
    }

    /// Build the request for `digest` under `profile`
    pub fn build_request(&self, digest: &Digest, profile: PromptProfile) -> CompletionRequest {
        let settings = self.profiles.get(profile);
        CompletionRequest::new(profile.system_prompt())
            .with_user_message(format!("{}\n\n{}", profile.lead_in(), digest))
            .with_temperature(settings.temperature)
            .with_top_p(settings.top_p)
            .with_max_tokens(settings.max_tokens)
    }

    /// Generate a summary of `digest`
    pub async fn summarize(&self, digest: &Digest, profile: PromptProfile) -> Result<String> {
        if !self.client.is_ready() {
            return Err(ScopeError::MissingCredential(
                "no API token configured for the completion service".to_string(),
            ));
        }

        let limit = self.profiles.get(profile).max_digest_chars;
        let size = digest.char_len();
        if size > limit {
            return Err(ScopeError::DigestTooLarge { size, limit });
        }

        debug!("Summarizing {} char digest as {}", size, profile);
        let response = self.client.complete(self.build_request(digest, profile)).await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(ScopeError::Upstream("completion returned no content".to_string()));
        }

        info!(
            "Summary generated for {} with {} ({} tokens)",
            profile,
            self.client.model(),
            response.usage.total()
        );
        Ok(text.to_string())
    }
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("model", &self.client.model())
            .field("profiles", &self.profiles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, Role, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Mock LLM client recording every request it receives
    struct MockLlmClient {
        ready: bool,
        response: String,
        calls: AtomicUsize,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl MockLlmClient {
        fn new(response: impl Into<String>) -> Self {
            Self {
                ready: true,
                response: response.into(),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn without_credential() -> Self {
            Self {
                ready: false,
                ..Self::new("unused")
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            Ok(CompletionResponse {
                content: self.response.clone(),
                finish_reason: Some("stop".to_string()),
                usage: Usage::new(10, 5),
            })
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    fn summarizer(client: Arc<MockLlmClient>) -> Summarizer {
        Summarizer::new(client, ProfilesConfig::default())
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let client = Arc::new(MockLlmClient::new("  ## All healthy\n"));
        let summary = summarizer(client.clone())
            .summarize(&Digest::new("pod-a 1/1 Running"), PromptProfile::ClusterHealth)
            .await
            .unwrap();

        assert_eq!(summary, "## All healthy");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let request = client.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.system, PromptProfile::ClusterHealth.system_prompt());
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.messages[0].content.starts_with("Analyze my pod status:"));
        assert!(request.messages[0].content.contains("pod-a 1/1 Running"));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_digest_too_large_skips_call() {
        let client = Arc::new(MockLlmClient::new("unused"));
        let mut profiles = ProfilesConfig::default();
        profiles.vulnerability_report.max_digest_chars = 10;
        let summarizer = Summarizer::new(client.clone(), profiles);

        let result = summarizer
            .summarize(&Digest::new("x".repeat(11)), PromptProfile::VulnerabilityReport)
            .await;

        assert!(matches!(result, Err(ScopeError::DigestTooLarge { size: 11, limit: 10 })));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_skips_call() {
        let client = Arc::new(MockLlmClient::without_credential());
        let result = summarizer(client.clone())
            .summarize(&Digest::new("anything"), PromptProfile::AuthBruteForce)
            .await;

        assert!(matches!(result, Err(ScopeError::MissingCredential(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_completion_is_upstream_error() {
        let client = Arc::new(MockLlmClient::new("   "));
        let result = summarizer(client)
            .summarize(&Digest::new("x"), PromptProfile::ClusterHealth)
            .await;
        assert!(matches!(result, Err(ScopeError::Upstream(_))));
    }

    #[test]
    fn test_build_request_uses_profile_settings() {
        let summarizer = summarizer(Arc::new(MockLlmClient::new("x")));
        let request = summarizer.build_request(&Digest::new("d"), PromptProfile::VulnerabilityReport);
        let settings = summarizer.profiles().get(PromptProfile::VulnerabilityReport);
        assert_eq!(request.temperature, Some(settings.temperature));
        assert_eq!(request.max_tokens, Some(settings.max_tokens));
        assert!(request.messages[0].content.starts_with("Summarize this vulnerability scan:"));
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(PromptProfile::ClusterHealth.slug(), "cluster-analysis");
        assert_eq!(PromptProfile::AuthBruteForce.to_string(), "bruteforce-review");
        assert_eq!(
            serde_json::to_string(&PromptProfile::VulnerabilityReport).unwrap(),
            "\"vulnerability_report\""
        );
    }
}
