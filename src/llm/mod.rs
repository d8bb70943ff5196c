//! LLM Client Layer - chat completions integration
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation for OpenAI-compatible endpoints

pub mod client;
pub mod openai;
pub mod types;

pub use client::LlmClient;
pub use openai::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TOKEN_ENV, OpenAiClient, OpenAiConfig};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};
