//! Correction engine: runs one utterance through classify, decode, apply, commit
//!
//! A cycle never fails. Whatever happens, the caller gets a [`CycleRecord`]; a
//! rejected correction leaves the session buffer exactly as it was.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::applier::apply_edit;
use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::decoders::{Decoder, DecoderSettings, build_decoder};
use crate::error::Result;
use crate::grammar::GrammarOptions;
use crate::providers::CompletionProvider;
use crate::session::SessionState;
use crate::types::{
    AmbiguityPolicy, CycleRecord, CycleStatus, DecoderKind, DictationMode, EditOp, RejectReason,
    Utterance, UtteranceKind,
};

/// Receives finished buffer changes and reflects them at the user's cursor
pub trait TypingSink: Send + Sync {
    /// Rewrite `old_text` on screen so it reads `new_text`
    fn apply_to_cursor(&self, old_text: &str, new_text: &str) -> Result<()>;
}

pub struct CorrectionEngine {
    classifier: Classifier,
    decoder: Arc<dyn Decoder>,
    policy: AmbiguityPolicy,
    dictation_mode: DictationMode,
}

impl CorrectionEngine {
    /// Engine around `decoder` with default policy and dictation mode
    pub fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self {
            classifier: Classifier::new(decoder.kind()),
            decoder,
            policy: AmbiguityPolicy::default(),
            dictation_mode: DictationMode::default(),
        }
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dictation_mode(mut self, mode: DictationMode) -> Self {
        self.dictation_mode = mode;
        self
    }

    /// Build from configuration. The provider is only used by the free-form decoder.
    pub fn from_config(
        config: &EngineConfig,
        provider: Option<Arc<dyn CompletionProvider>>,
    ) -> Result<Self> {
        let decoder = build_decoder(
            config.decoder,
            DecoderSettings {
                grammar: GrammarOptions {
                    resolve_reference_words: config.resolve_reference_words,
                },
                provider,
                timeout: config.free_form_timeout(),
            },
        )?;

        info!(
            "Correction engine ready: decoder={}, ambiguity={}, dictation={}",
            config.decoder.as_str(),
            config.ambiguity.as_str(),
            config.dictation.as_str()
        );

        Ok(Self::new(decoder)
            .with_policy(config.ambiguity)
            .with_dictation_mode(config.dictation))
    }

    pub fn decoder_kind(&self) -> DecoderKind {
        self.decoder.kind()
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    pub fn dictation_mode(&self) -> DictationMode {
        self.dictation_mode
    }

    pub fn classify(&self, utterance: &Utterance) -> UtteranceKind {
        self.classifier.classify(utterance)
    }

    /// Run one cycle against `state`
    pub async fn process(&self, state: &mut SessionState, utterance: &Utterance) -> CycleRecord {
        let before = state.buffer().to_string();

        if self.classify(utterance) == UtteranceKind::Dictation {
            let transition = state.append_dictation(&utterance.text, self.dictation_mode);
            debug!("Dictation: {} chars appended", utterance.text.chars().count());
            return CycleRecord::dictation(utterance.text.clone(), before, transition.current);
        }

        let kind = self.decoder.kind();
        let rejected = |op: Option<EditOp>, reason: RejectReason| {
            warn!("Correction '{}' rejected: {}", utterance.text, reason);
            CycleRecord::correction(
                utterance.text.clone(),
                kind,
                op,
                CycleStatus::Rejected(reason),
                before.clone(),
                before.clone(),
            )
        };

        if before.is_empty() {
            return rejected(None, RejectReason::NoMatch);
        }

        let op = match self.decoder.decode(utterance, &before).await {
            Ok(op) => op,
            Err(reason) => return rejected(None, reason),
        };

        match apply_edit(&before, &op, self.policy) {
            Ok(edit) => {
                let transition = state.commit(edit);
                info!("Applied correction: {}", op);
                CycleRecord::correction(
                    utterance.text.clone(),
                    kind,
                    Some(op),
                    CycleStatus::Corrected,
                    transition.previous,
                    transition.current,
                )
            }
            Err(reason) => rejected(Some(op), reason),
        }
    }

    /// Run one cycle and hand any buffer change to `sink`
    pub async fn process_and_type(
        &self,
        state: &mut SessionState,
        utterance: &Utterance,
        sink: &dyn TypingSink,
    ) -> Result<CycleRecord> {
        let record = self.process(state, utterance).await;
        if record.changed() {
            sink.apply_to_cursor(&record.before, &record.after)?;
        }
        Ok(record)
    }
}
