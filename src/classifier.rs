//! Dictation/correction classification
//!
//! An utterance is a correction if it reads like a command, or if the tagger marked
//! part of it as text to modify. Everything else is new dictation.

use crate::grammar;
use crate::types::{DecoderKind, SpanLabel, Utterance, UtteranceKind};

/// Decides whether an utterance is new text or an edit to existing text
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    backend: DecoderKind,
}

impl Classifier {
    pub fn new(backend: DecoderKind) -> Self {
        Self { backend }
    }

    /// Classify one utterance
    ///
    /// # Examples
    /// ```
    /// use flow_edit::classifier::Classifier;
    /// use flow_edit::types::{DecoderKind, Utterance, UtteranceKind};
    ///
    /// let classifier = Classifier::new(DecoderKind::Pattern);
    /// assert_eq!(classifier.classify(&Utterance::new("刪除錯字")), UtteranceKind::Correction);
    /// assert_eq!(classifier.classify(&Utterance::new("今天天氣很好")), UtteranceKind::Dictation);
    /// ```
    pub fn classify(&self, utterance: &Utterance) -> UtteranceKind {
        let tagged_target =
            self.backend == DecoderKind::TaggedSpan && utterance.has_label(SpanLabel::Modify);

        if tagged_target || grammar::is_command(&utterance.text) {
            UtteranceKind::Correction
        } else {
            UtteranceKind::Dictation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modify_at(text: &str, index: usize) -> Utterance {
        let labels = (0..text.chars().count())
            .map(|i| {
                if i == index {
                    SpanLabel::Modify
                } else {
                    SpanLabel::Outside
                }
            })
            .collect();
        Utterance::new(text).with_labels(labels)
    }

    #[test]
    fn test_command_templates_are_corrections() {
        let classifier = Classifier::new(DecoderKind::Pattern);
        for text in ["刪除很", "把器改成氣", "在好前面新增很", "在天後面新增氣", "刪掉很。"] {
            assert_eq!(
                classifier.classify(&Utterance::new(text)),
                UtteranceKind::Correction,
                "{text}"
            );
        }
    }

    #[test]
    fn test_plain_text_is_dictation() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&Utterance::new("我們明天下午開會")),
            UtteranceKind::Dictation
        );
        assert_eq!(classifier.classify(&Utterance::new("")), UtteranceKind::Dictation);
    }

    #[test]
    fn test_modify_label_counts_only_for_tagged_backend() {
        let utterance = modify_at("這個字不對", 1);

        let tagged = Classifier::new(DecoderKind::TaggedSpan);
        assert_eq!(tagged.classify(&utterance), UtteranceKind::Correction);

        let pattern = Classifier::new(DecoderKind::Pattern);
        assert_eq!(pattern.classify(&utterance), UtteranceKind::Dictation);
    }

    #[test]
    fn test_filling_label_alone_is_dictation() {
        let utterance = Utterance::new("很好").with_labels(vec![SpanLabel::Filling; 2]);
        let classifier = Classifier::new(DecoderKind::TaggedSpan);
        assert_eq!(classifier.classify(&utterance), UtteranceKind::Dictation);
    }

    #[test]
    fn test_template_match_wins_without_labels() {
        let classifier = Classifier::new(DecoderKind::TaggedSpan);
        assert_eq!(
            classifier.classify(&Utterance::new("把器改成氣")),
            UtteranceKind::Correction
        );
    }
}
