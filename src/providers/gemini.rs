//! Gemini completion provider

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};

use super::chat::send_chat;
use super::{CompletionProvider, CompletionRequest, CompletionResponse};

const GEMINI_OPENAI_COMPAT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Gemini completion provider (using OpenAI-compatible endpoint)
pub struct GeminiCompletionProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiCompletionProvider {
    /// Create a new provider (API key loaded from environment if not provided)
    pub fn new(api_key: Option<String>) -> Self {
        let key = api_key.or_else(|| std::env::var("GEMINI_API_KEY").ok());

        Self {
            client: Client::new(),
            api_key: key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::ProviderNotConfigured("Gemini API key not set".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for GeminiCompletionProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key()?;
        send_chat(
            &self.client,
            self.name(),
            GEMINI_OPENAI_COMPAT_BASE,
            api_key,
            &self.model,
            request,
        )
        .await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_configures_provider() {
        let provider = GeminiCompletionProvider::new(Some("key".to_string()));
        assert!(provider.is_configured());
        assert_eq!(provider.model(), DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_model_override() {
        let provider =
            GeminiCompletionProvider::new(Some("key".to_string())).with_model("gemini-2.5-pro");
        assert_eq!(provider.model(), "gemini-2.5-pro");
    }
}
