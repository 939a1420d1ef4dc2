use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Core trait for generation providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `request.prompt` with `request.model`
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Model identifiers that currently support text generation
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod catalog;
pub mod gemini;
pub mod summarizer;
