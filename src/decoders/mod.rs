//! Command decoders
//!
//! Three interchangeable backends turn a correction utterance into an [`EditOp`]:
//! per-character tags from a sequence tagger, the fixed command grammar, and a remote
//! chat model. Exactly one is active per engine.

mod free_form;
mod pattern;
mod tagged;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::grammar::GrammarOptions;
use crate::providers::CompletionProvider;
use crate::types::{DecoderKind, EditOp, RejectReason, Utterance};

pub use free_form::{FreeFormDecoder, parse_reply};
pub use pattern::PatternDecoder;
pub use tagged::TaggedSpanDecoder;

/// Outcome of decoding one utterance
pub type DecodeResult = std::result::Result<EditOp, RejectReason>;

/// Trait for command decoders
///
/// A decoder either returns one well-formed operation or a reason. It never returns
/// an op with an empty target or payload.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> DecoderKind;

    /// Decode a correction utterance; `buffer` is the text being corrected
    async fn decode(&self, utterance: &Utterance, buffer: &str) -> DecodeResult;
}

/// Everything needed to construct any decoder
#[derive(Clone, Default)]
pub struct DecoderSettings {
    pub grammar: GrammarOptions,
    pub provider: Option<Arc<dyn CompletionProvider>>,
    pub timeout: Duration,
}

/// Build the decoder for `kind`
pub fn build_decoder(kind: DecoderKind, settings: DecoderSettings) -> Result<Arc<dyn Decoder>> {
    let decoder: Arc<dyn Decoder> = match kind {
        DecoderKind::TaggedSpan => Arc::new(TaggedSpanDecoder::new()),
        DecoderKind::Pattern => Arc::new(PatternDecoder::new(settings.grammar)),
        DecoderKind::FreeForm => {
            let provider = settings.provider.ok_or_else(|| {
                Error::ProviderNotConfigured(
                    "free-form decoding needs a completion provider".to_string(),
                )
            })?;
            Arc::new(FreeFormDecoder::new(provider, settings.timeout))
        }
    };
    Ok(decoder)
}

/// Reject ops that break the data-model invariants
fn checked(op: EditOp) -> DecodeResult {
    match op.validate() {
        Ok(()) => Ok(op),
        Err(problem) => {
            tracing::warn!("Decoded op {} is malformed: {}", op, problem);
            Err(RejectReason::InvalidOp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_each_local_decoder() {
        for kind in [DecoderKind::TaggedSpan, DecoderKind::Pattern] {
            let decoder = build_decoder(kind, DecoderSettings::default()).unwrap();
            assert_eq!(decoder.kind(), kind);
        }
    }

    #[test]
    fn test_free_form_requires_provider() {
        let result = build_decoder(DecoderKind::FreeForm, DecoderSettings::default());
        assert!(matches!(result, Err(Error::ProviderNotConfigured(_))));
    }

    #[test]
    fn test_checked_rejects_empty_payload() {
        assert_eq!(
            checked(EditOp::replace("器", "")),
            Err(RejectReason::InvalidOp)
        );
        assert_eq!(checked(EditOp::delete("很")), Ok(EditOp::delete("很")));
    }
}
