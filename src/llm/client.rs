//! LLM client trait

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model used when the request does not name one
    fn model(&self) -> &str;

    /// Whether a credential is available
    fn is_ready(&self) -> bool;
}
