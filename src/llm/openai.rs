//! OpenAI-compatible chat completions client
//!
//! Talks to any endpoint exposing `POST {endpoint}/chat/completions` with
//! bearer authentication, GitHub Models by default.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{Result, ScopeError};
use crate::llm::client::LlmClient;
use crate::llm::types::{CompletionRequest, CompletionResponse, Usage};

/// Default inference endpoint
pub const DEFAULT_ENDPOINT: &str = "https://models.github.ai/inference";

/// Default model to use
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Environment variable holding the API token by default
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Longest upstream error body echoed back to callers
const ERROR_BODY_CHARS: usize = 200;

/// Configuration for the chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config pointing at a specific endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Chat completions API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    token_env: String,
    config: OpenAiConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenAiClient {
    /// Create a client reading its token from `token_env`.
    ///
    /// A missing token is not an error here; the client reports not ready
    /// and every completion fails with a missing-credential error.
    pub fn from_env(token_env: &str, config: OpenAiConfig) -> Result<Self> {
        let api_key = std::env::var(token_env).unwrap_or_default();
        if api_key.is_empty() {
            warn!("{} is not set; summaries will be unavailable", token_env);
        }
        let mut client = Self::with_api_key(api_key, config)?;
        client.token_env = token_env.to_string();
        Ok(client)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScopeError::Upstream(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build the request body for the chat completions API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let messages: Vec<Value> = request
            .ordered_messages()
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            })
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse> {
        let choice = &body["choices"][0];
        let content = choice["message"]["content"].as_str().unwrap_or("").trim().to_string();
        if content.is_empty() {
            return Err(ScopeError::Upstream("response contained no content".to_string()));
        }

        let usage = match body.get("usage") {
            Some(u) => Usage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            ),
            None => Usage::default(),
        };

        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        Ok(CompletionResponse {
            content,
            finish_reason: choice["finish_reason"].as_str().map(String::from),
            usage,
        })
    }

    /// Send a request to the completions endpoint
    async fn send_request(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScopeError::Upstream(format!("Request failed: {}", e)))?;

        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScopeError::Upstream(format!(
                "Rate limited, retry after {} seconds",
                retry_after
            )));
        }

        // Handle other errors
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error_body: String = error_body.chars().take(ERROR_BODY_CHARS).collect();
            return Err(ScopeError::Upstream(format!("API error {}: {}", status, error_body)));
        }

        response
            .json()
            .await
            .map_err(|e| ScopeError::Upstream(format!("Failed to parse response: {}", e)))
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if !self.is_ready() {
            return Err(ScopeError::MissingCredential(format!("{} is not set", self.token_env)));
        }
        let body = self.build_request(&request);
        debug!("Sending completion request to {}", self.completions_url());
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
