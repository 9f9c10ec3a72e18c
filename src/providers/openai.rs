//! OpenAI completion provider

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};

use super::chat::send_chat;
use super::{CompletionProvider, CompletionRequest, CompletionResponse};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// OpenAI GPT completion provider
pub struct OpenAICompletionProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAICompletionProvider {
    /// Create a new provider (API key loaded from environment if not provided)
    pub fn new(api_key: Option<String>) -> Self {
        let key = api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok());

        Self {
            client: Client::new(),
            api_key: key,
            model: DEFAULT_OPENAI_MODEL.to_string(),
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
            .ok_or_else(|| Error::ProviderNotConfigured("OpenAI API key not set".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key()?;
        send_chat(
            &self.client,
            self.name(),
            OPENAI_API_BASE,
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
