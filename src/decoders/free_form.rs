//! Decoder that asks a chat model to interpret the command
//!
//! The model gets the text being corrected and the spoken instruction, and must
//! answer with one JSON edit operation. Anything else is rejected as `InvalidOp`.
//! Transport failures and timeouts are `ServiceError`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::providers::{CompletionProvider, CompletionRequest};
use crate::types::{DecoderKind, EditOp, RejectReason, Utterance};

use super::{DecodeResult, Decoder, checked};

const MAX_REPLY_TOKENS: u32 = 256;

const SYSTEM_PROMPT: &str = "\
你是一個中文文字編輯助手。使用者會提供「原始文字」和一句口語的「語音指令」，\
請把語音指令轉換成下列其中一種 JSON 編輯操作：
{\"op\": \"delete\", \"target\": \"要刪除的文字\"}
{\"op\": \"replace\", \"target\": \"要被取代的文字\", \"replacement\": \"新的文字\"}
{\"op\": \"insert_before\", \"anchor\": \"定位文字\", \"content\": \"要插入的文字\"}
{\"op\": \"insert_after\", \"anchor\": \"定位文字\", \"content\": \"要插入的文字\"}

規則：
1. target 和 anchor 必須是原始文字中實際出現的片段，而且不可為空。
2. replacement 和 content 不可為空；要移除文字請用 delete。
3. 指令中的「X的Y」表示 X 這個詞裡的 Y 這個字，例如「欣賞的欣」指的是「欣」。
4. 只輸出一個 JSON 物件，不要輸出任何說明、前綴或 Markdown。";

/// Decodes commands through a [`CompletionProvider`] with a hard deadline
pub struct FreeFormDecoder {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl FreeFormDecoder {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    fn build_request(utterance: &Utterance, buffer: &str) -> CompletionRequest {
        CompletionRequest::new(format!(
            "原始文字：{}\n語音指令：{}",
            buffer, utterance.text
        ))
        .with_system_prompt(SYSTEM_PROMPT)
        .with_max_tokens(MAX_REPLY_TOKENS)
        .with_temperature(0.0)
    }
}

#[async_trait]
impl Decoder for FreeFormDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::FreeForm
    }

    async fn decode(&self, utterance: &Utterance, buffer: &str) -> DecodeResult {
        let request = Self::build_request(utterance, buffer);

        let reply = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await
        {
            Ok(Ok(response)) => response.text,
            Ok(Err(e)) => {
                error!("{} completion failed: {}", self.provider.name(), e);
                return Err(RejectReason::ServiceError);
            }
            Err(_) => {
                warn!(
                    "{} did not answer within {:?}",
                    self.provider.name(),
                    self.timeout
                );
                return Err(RejectReason::ServiceError);
            }
        };

        debug!("{} replied: {}", self.provider.name(), reply);
        parse_reply(&reply)
    }
}

/// Turn a model reply into a validated edit operation.
///
/// Code fences, wrapping quotes and any prose around the JSON object are ignored.
pub fn parse_reply(reply: &str) -> DecodeResult {
    let cleaned = clean_reply(reply);
    if cleaned.is_empty() {
        warn!("Model returned an empty reply");
        return Err(RejectReason::InvalidOp);
    }

    let wire: ReplyOp = serde_json::from_str(cleaned).map_err(|e| {
        warn!("Model reply is not an edit op ({}): {}", e, reply);
        RejectReason::InvalidOp
    })?;
    let Some(op) = wire.into_edit_op() else {
        warn!("Model reply mixes fields of different ops: {}", reply);
        return Err(RejectReason::InvalidOp);
    };
    checked(op)
}

/// Reply shape as the model writes it. Each op must carry exactly its own fields.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplyOp {
    op: String,
    target: Option<String>,
    replacement: Option<String>,
    anchor: Option<String>,
    content: Option<String>,
}

impl ReplyOp {
    fn into_edit_op(self) -> Option<EditOp> {
        match (
            self.op.as_str(),
            self.target,
            self.replacement,
            self.anchor,
            self.content,
        ) {
            ("delete", Some(target), None, None, None) => Some(EditOp::delete(target)),
            ("replace", Some(target), Some(replacement), None, None) => {
                Some(EditOp::replace(target, replacement))
            }
            ("insert_before", None, None, Some(anchor), Some(content)) => {
                Some(EditOp::insert_before(anchor, content))
            }
            ("insert_after", None, None, Some(anchor), Some(content)) => {
                Some(EditOp::insert_after(anchor, content))
            }
            _ => None,
        }
    }
}

fn clean_reply(reply: &str) -> &str {
    let mut text = reply.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string (```json) along with the opening fence
        text = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
        text = text.trim_end().trim_end_matches("```");
    }

    let text = text
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '「' | '」'));

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}
