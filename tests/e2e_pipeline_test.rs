//! End-to-end pipeline tests
//!
//! These tests run whole dictate-then-correct sessions through the public API:
//! - the worked examples for each edit form
//! - all three decoders producing the same edits
//! - rejection paths leaving the buffer untouched
//! - cycle records flowing into storage

use std::sync::Arc;

use async_trait::async_trait;
use flow_edit::decoders::{DecoderSettings, build_decoder};
use flow_edit::providers::{CompletionProvider, CompletionRequest, CompletionResponse};
use flow_edit::storage::Storage;
use flow_edit::{
    AmbiguityPolicy, ApplyOutcome, CorrectionEngine, CycleStatus, DecoderKind, EditOp,
    EngineConfig, FreeFormDecoder, PatternDecoder, RejectReason, SessionState, SpanLabel,
    TaggedSpanDecoder, Utterance, UtteranceKind, apply,
};

/// Always answers with the same edit op JSON
struct CannedProvider(&'static str);

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn name(&self) -> &'static str {
        "Canned"
    }

    async fn complete(&self, _request: CompletionRequest) -> flow_edit::Result<CompletionResponse> {
        Ok(CompletionResponse {
            text: self.0.to_string(),
            usage: None,
            model: None,
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn labels(tags: &str) -> Vec<SpanLabel> {
    SpanLabel::parse_sequence(tags).expect("valid tags")
}

// ============ Worked Examples ============

#[test]
fn test_worked_examples() {
    assert_eq!(
        apply("今天天器很好", &EditOp::replace("器", "氣")),
        ApplyOutcome::Applied("今天天氣很好".to_string())
    );
    assert_eq!(
        apply("今天天氣很好", &EditOp::delete("很")),
        ApplyOutcome::Applied("今天天氣好".to_string())
    );
    assert_eq!(
        apply("今天好", &EditOp::insert_before("好", "很")),
        ApplyOutcome::Applied("今天很好".to_string())
    );
    assert_eq!(
        apply("今天天氣好", &EditOp::insert_after("天", "氣")),
        ApplyOutcome::Rejected(RejectReason::AmbiguousMatch)
    );
}

#[tokio::test]
async fn test_pattern_delete_of_missing_text() {
    let engine = CorrectionEngine::new(Arc::new(PatternDecoder::default()));
    let mut state = SessionState::with_buffer("今天天氣很好");

    let record = engine.process(&mut state, &Utterance::new("刪除錯字")).await;

    assert_eq!(record.op, Some(EditOp::delete("錯字")));
    assert_eq!(record.status, CycleStatus::Rejected(RejectReason::NoMatch));
    assert_eq!(state.buffer(), "今天天氣很好");
}

// ============ Full Sessions ============

#[tokio::test]
async fn test_dictate_correct_undo_session() {
    let engine = CorrectionEngine::new(Arc::new(PatternDecoder::default()));
    let mut state = SessionState::new();

    engine
        .process(&mut state, &Utterance::new("我們明天下午三點開會"))
        .await;
    engine
        .process(&mut state, &Utterance::new("，記得帶報告。"))
        .await;
    assert_eq!(state.buffer(), "我們明天下午三點開會，記得帶報告。");

    let record = engine
        .process(&mut state, &Utterance::new("把三點改成四點。"))
        .await;
    assert_eq!(record.status, CycleStatus::Corrected);
    assert_eq!(state.buffer(), "我們明天下午四點開會，記得帶報告。");

    let record = engine
        .process(&mut state, &Utterance::new("在報告前面新增季度"))
        .await;
    assert_eq!(record.status, CycleStatus::Corrected);
    assert_eq!(state.buffer(), "我們明天下午四點開會，記得帶季度報告。");

    let transition = state.undo().expect("an edit to undo");
    assert_eq!(transition.current, "我們明天下午四點開會，記得帶報告。");
}

#[tokio::test]
async fn test_each_decoder_produces_the_same_edit() {
    let buffer = "今天天器很好";
    let expected = "今天天氣很好";

    let tagged = CorrectionEngine::new(Arc::new(TaggedSpanDecoder::new()));
    let mut state = SessionState::with_buffer(buffer);
    let utterance = Utterance::new("把器改成氣").with_labels(labels("O B-Modify O O B-Filling"));
    tagged.process(&mut state, &utterance).await;
    assert_eq!(state.buffer(), expected);

    let pattern = CorrectionEngine::new(Arc::new(PatternDecoder::default()));
    let mut state = SessionState::with_buffer(buffer);
    pattern
        .process(&mut state, &Utterance::new("把器改成氣"))
        .await;
    assert_eq!(state.buffer(), expected);

    let provider = Arc::new(CannedProvider(
        r#"{"op":"replace","target":"器","replacement":"氣"}"#,
    ));
    let free_form = CorrectionEngine::new(Arc::new(FreeFormDecoder::new(
        provider,
        std::time::Duration::from_secs(2),
    )));
    let mut state = SessionState::with_buffer(buffer);
    free_form
        .process(&mut state, &Utterance::new("把器改成氣"))
        .await;
    assert_eq!(state.buffer(), expected);
}

#[tokio::test]
async fn test_free_form_garbage_is_never_applied() {
    let provider: Arc<dyn CompletionProvider> = Arc::new(CannedProvider("好的，我已經幫你改好了！"));
    let decoder = build_decoder(
        DecoderKind::FreeForm,
        DecoderSettings {
            provider: Some(provider),
            timeout: std::time::Duration::from_secs(2),
            ..DecoderSettings::default()
        },
    )
    .unwrap();
    let engine = CorrectionEngine::new(decoder);
    let mut state = SessionState::with_buffer("今天天器很好");

    let record = engine
        .process(&mut state, &Utterance::new("把器改成氣"))
        .await;
    assert_eq!(record.status, CycleStatus::Rejected(RejectReason::InvalidOp));
    assert_eq!(record.op, None);
    assert_eq!(state.buffer(), "今天天器很好");
}

#[tokio::test]
async fn test_ambiguous_target_then_disambiguated() {
    let engine = CorrectionEngine::new(Arc::new(PatternDecoder::default()));
    let mut state = SessionState::with_buffer("他說好，我也說好");

    let record = engine.process(&mut state, &Utterance::new("把好改成行")).await;
    assert_eq!(
        record.status,
        CycleStatus::Rejected(RejectReason::AmbiguousMatch)
    );

    // a longer target is unique
    let record = engine
        .process(&mut state, &Utterance::new("把也說好改成也說行"))
        .await;
    assert_eq!(record.status, CycleStatus::Corrected);
    assert_eq!(state.buffer(), "他說好，我也說行");
}

#[tokio::test]
async fn test_config_driven_engine() {
    let storage = Storage::in_memory().unwrap();
    EngineConfig {
        ambiguity: AmbiguityPolicy::PreferLast,
        resolve_reference_words: true,
        ..EngineConfig::default()
    }
    .save(&storage)
    .unwrap();

    let config = EngineConfig::load(&storage).unwrap();
    let engine = CorrectionEngine::from_config(&config, None).unwrap();
    assert_eq!(engine.decoder_kind(), DecoderKind::Pattern);

    let mut state = SessionState::with_buffer("心情很好，心情很棒");
    let record = engine
        .process(&mut state, &Utterance::new("把開心的心改成欣賞的欣"))
        .await;
    assert_eq!(record.op, Some(EditOp::replace("心", "欣")));
    assert_eq!(state.buffer(), "心情很好，欣情很棒");
}

#[tokio::test]
async fn test_cycles_are_logged() {
    let storage = Storage::in_memory().unwrap();
    let engine = CorrectionEngine::new(Arc::new(PatternDecoder::default()));
    let mut state = SessionState::new();

    for text in ["今天天氣很好", "刪除很", "刪除很", "把天改成日"] {
        let record = engine.process(&mut state, &Utterance::new(text)).await;
        storage.save_cycle(&record).unwrap();
    }

    assert_eq!(storage.get_cycle_count().unwrap(), 4);
    assert_eq!(storage.get_rejection_count(RejectReason::NoMatch).unwrap(), 1);
    assert_eq!(
        storage
            .get_rejection_count(RejectReason::AmbiguousMatch)
            .unwrap(),
        1
    );

    let recent = storage.get_recent_cycles(10).unwrap();
    assert_eq!(recent.len(), 4);
    assert!(recent.iter().any(|c| c.kind == UtteranceKind::Dictation));
}
