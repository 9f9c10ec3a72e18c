//! OpenAI-compatible chat completion wire format shared by the providers

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Error, Result};

use super::completion::TokenUsage;
use super::{CompletionRequest, CompletionResponse};

/// Used when the request does not set a temperature
const DEFAULT_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn build_request(model: &str, request: CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = request.system_prompt {
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: request.text,
    });

    ChatRequest {
        model: model.to_string(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
    }
}

fn into_completion(chat_response: ChatResponse) -> Result<CompletionResponse> {
    let text = chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Completion("No completion returned".to_string()))?;

    Ok(CompletionResponse {
        text,
        usage: chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: chat_response.model,
    })
}

/// POST one chat completion to `{base}/chat/completions`
pub(super) async fn send_chat(
    client: &Client,
    provider: &str,
    base: &str,
    api_key: &str,
    model: &str,
    request: CompletionRequest,
) -> Result<CompletionResponse> {
    let chat_request = build_request(model, request);

    debug!("Sending completion request to {}", provider);

    let response = client
        .post(format!("{}/chat/completions", base))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&chat_request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        error!("{} API error: {} - {}", provider, status, error_text);
        return Err(Error::Completion(format!(
            "{} API error: {} - {}",
            provider, status, error_text
        )));
    }

    let chat_response: ChatResponse = response.json().await?;
    into_completion(chat_response)
}
