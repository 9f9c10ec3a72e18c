//! Decoder backed by the fixed command grammar

use async_trait::async_trait;
use tracing::debug;

use crate::grammar::{self, GrammarOptions};
use crate::types::{DecoderKind, RejectReason, Utterance};

use super::{DecodeResult, Decoder, checked};

/// Matches the utterance text against the command templates
#[derive(Debug, Clone, Default)]
pub struct PatternDecoder {
    options: GrammarOptions,
}

impl PatternDecoder {
    pub fn new(options: GrammarOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Decoder for PatternDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Pattern
    }

    async fn decode(&self, utterance: &Utterance, _buffer: &str) -> DecodeResult {
        match grammar::parse(&utterance.text, self.options) {
            Some(op) => checked(op),
            None => {
                debug!("No command template matches '{}'", utterance.text);
                Err(RejectReason::InvalidOp)
            }
        }
    }
}
