//! Completion provider trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request for a single chat completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User message
    pub text: String,
    /// Optional system instruction
    pub system_prompt: Option<String>,
    /// Max tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature, provider default when None
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Response from completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model used for completion
    pub model: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for chat completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Run one completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Check if the provider is configured and ready
    fn is_configured(&self) -> bool;
}
