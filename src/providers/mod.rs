//! Provider abstraction layer for completion services
//!
//! The free-form decoder talks to a chat model through [`CompletionProvider`].
//! Gemini and OpenAI are supported through their OpenAI-compatible endpoints.
mod chat;
mod completion;
mod gemini;
mod openai;

pub use completion::{CompletionProvider, CompletionRequest, CompletionResponse, TokenUsage};
pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiCompletionProvider};
pub use openai::{DEFAULT_OPENAI_MODEL, OpenAICompletionProvider};
