//! Decoder for utterances tagged per character by a sequence tagger
//!
//! `B-Modify` runs name the text to change, `B-Filling` runs the new text. With one
//! of each, the untagged words between them say which edit is meant: "改成" style
//! phrasing means replace, "前面" means insert before, "後面" insert after.

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use async_trait::async_trait;
use tracing::debug;

use crate::types::{DecoderKind, EditOp, RejectReason, SpanLabel, Utterance};

use super::{DecodeResult, Decoder, checked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Replace,
    Before,
    After,
}

const MARKERS: &[(&str, Marker)] = &[
    ("改成", Marker::Replace),
    ("換成", Marker::Replace),
    ("换成", Marker::Replace),
    ("前面", Marker::Before),
    ("後面", Marker::After),
    ("后面", Marker::After),
];

static MARKER_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostLongest)
        .build(MARKERS.iter().map(|(pattern, _)| *pattern))
        .expect("marker patterns build an automaton")
});

/// A maximal run of one label
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    label: SpanLabel,
    start: usize,
    end: usize,
    text: String,
}

/// Split text into maximal runs of identical labels, skipping `O` runs
fn labeled_runs(chars: &[char], labels: &[SpanLabel]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();

    for (i, (&c, &label)) in chars.iter().zip(labels).enumerate() {
        if label == SpanLabel::Outside {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.label == label && run.end == i => {
                run.end = i + 1;
                run.text.push(c);
            }
            _ => runs.push(Run {
                label,
                start: i,
                end: i + 1,
                text: c.to_string(),
            }),
        }
    }

    runs
}

fn markers_in(text: &str) -> Vec<Marker> {
    MARKER_AUTOMATON
        .find_iter(text)
        .map(|m| MARKERS[m.pattern().as_usize()].1)
        .collect()
}

/// Decides the edit from `B-Modify` / `B-Filling` labels
#[derive(Debug, Clone, Default)]
pub struct TaggedSpanDecoder;

impl TaggedSpanDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_labels(&self, text: &str, labels: &[SpanLabel]) -> DecodeResult {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() != labels.len() {
            debug!(
                "Label count {} does not match character count {}",
                labels.len(),
                chars.len()
            );
            return Err(RejectReason::InvalidOp);
        }

        let runs = labeled_runs(&chars, labels);
        let targets: Vec<&Run> = runs.iter().filter(|r| r.label == SpanLabel::Modify).collect();
        let fillings: Vec<&Run> = runs.iter().filter(|r| r.label == SpanLabel::Filling).collect();

        match (targets.as_slice(), fillings.as_slice()) {
            ([target], []) => checked(EditOp::delete(target.text.clone())),
            ([target], [filling]) => {
                let (gap_start, gap_end) = if target.end <= filling.start {
                    (target.end, filling.start)
                } else {
                    (filling.end, target.start)
                };
                let gap: String = chars[gap_start..gap_end].iter().collect();
                let markers = markers_in(&gap);

                let target = target.text.clone();
                let filling = filling.text.clone();
                // every marker, 改成 included, must sit between the two spans
                if markers.contains(&Marker::Replace) {
                    return checked(EditOp::replace(target, filling));
                }
                match (
                    markers.contains(&Marker::Before),
                    markers.contains(&Marker::After),
                ) {
                    (true, false) => checked(EditOp::insert_before(target, filling)),
                    (false, true) => checked(EditOp::insert_after(target, filling)),
                    _ => {
                        debug!("No single edit marker between spans: '{}'", gap);
                        Err(RejectReason::InvalidOp)
                    }
                }
            }
            _ => {
                debug!(
                    "Cannot decode {} target span(s) and {} filling span(s)",
                    targets.len(),
                    fillings.len()
                );
                Err(RejectReason::InvalidOp)
            }
        }
    }
}

#[async_trait]
impl Decoder for TaggedSpanDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::TaggedSpan
    }

    async fn decode(&self, utterance: &Utterance, _buffer: &str) -> DecodeResult {
        let Some(labels) = utterance.labels.as_deref() else {
            debug!("Utterance '{}' has no labels", utterance.text);
            return Err(RejectReason::InvalidOp);
        };
        self.decode_labels(&utterance.text, labels)
    }
}
