//! Core types used throughout flow-edit

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for processed cycles
pub type CycleId = Uuid;

/// Per-character label emitted by the sequence tagger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanLabel {
    /// O - ordinary character, not part of a span
    #[serde(rename = "O")]
    Outside,
    /// B-Modify - part of the text to modify (target or anchor)
    #[serde(rename = "B-Modify")]
    Modify,
    /// B-Filling - part of the replacement or inserted content
    #[serde(rename = "B-Filling")]
    Filling,
}

impl SpanLabel {
    /// Tag name as produced by the tagger
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outside => "O",
            Self::Modify => "B-Modify",
            Self::Filling => "B-Filling",
        }
    }

    /// Parse a tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "O" => Some(Self::Outside),
            "B-Modify" => Some(Self::Modify),
            "B-Filling" => Some(Self::Filling),
            _ => None,
        }
    }

    /// Map a model label id (0 = O, 1 = B-Modify, 2 = B-Filling)
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Outside),
            1 => Some(Self::Modify),
            2 => Some(Self::Filling),
            _ => None,
        }
    }

    /// Parse a whitespace-separated tag string such as `"O O B-Modify"`.
    ///
    /// Returns None if any tag is unknown.
    pub fn parse_sequence(tags: &str) -> Option<Vec<Self>> {
        tags.split_whitespace().map(Self::from_tag).collect()
    }
}

/// One recognized block of speech
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Recognized text
    pub text: String,
    /// Per-character labels, aligned 1:1 with `text.chars()` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<SpanLabel>>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: Vec<SpanLabel>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// True if the label sequence contains at least one label of the given kind
    pub fn has_label(&self, label: SpanLabel) -> bool {
        self.labels
            .as_ref()
            .is_some_and(|labels| labels.contains(&label))
    }
}

/// A structured correction instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    Delete { target: String },
    Replace { target: String, replacement: String },
    InsertBefore { anchor: String, content: String },
    InsertAfter { anchor: String, content: String },
}

impl EditOp {
    pub fn delete(target: impl Into<String>) -> Self {
        Self::Delete {
            target: target.into(),
        }
    }

    pub fn replace(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::Replace {
            target: target.into(),
            replacement: replacement.into(),
        }
    }

    pub fn insert_before(anchor: impl Into<String>, content: impl Into<String>) -> Self {
        Self::InsertBefore {
            anchor: anchor.into(),
            content: content.into(),
        }
    }

    pub fn insert_after(anchor: impl Into<String>, content: impl Into<String>) -> Self {
        Self::InsertAfter {
            anchor: anchor.into(),
            content: content.into(),
        }
    }

    /// The text that must be located in the buffer (target or anchor)
    pub fn locus(&self) -> &str {
        match self {
            Self::Delete { target } | Self::Replace { target, .. } => target.as_str(),
            Self::InsertBefore { anchor, .. } | Self::InsertAfter { anchor, .. } => {
                anchor.as_str()
            }
        }
    }

    /// The text written into the buffer, if any
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Delete { .. } => None,
            Self::Replace { replacement, .. } => Some(replacement.as_str()),
            Self::InsertBefore { content, .. } | Self::InsertAfter { content, .. } => {
                Some(content.as_str())
            }
        }
    }

    /// Short operation name, matches the serialized `op` tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
            Self::InsertBefore { .. } => "insert_before",
            Self::InsertAfter { .. } => "insert_after",
        }
    }

    /// Check the data-model invariants: non-empty target/anchor, non-empty payload
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.locus().is_empty() {
            return Err("target or anchor is empty");
        }
        if self.payload().is_some_and(str::is_empty) {
            return Err("replacement or content is empty");
        }
        Ok(())
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { target } => write!(f, "delete '{target}'"),
            Self::Replace {
                target,
                replacement,
            } => write!(f, "replace '{target}' with '{replacement}'"),
            Self::InsertBefore { anchor, content } => {
                write!(f, "insert '{content}' before '{anchor}'")
            }
            Self::InsertAfter { anchor, content } => {
                write!(f, "insert '{content}' after '{anchor}'")
            }
        }
    }
}

/// Half-open interval of character (not byte) indices into a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} is past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Result of locating a needle in a buffer
///
/// Ranges never overlap and are ordered left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    NotFound,
    Unique(CharRange),
    Ambiguous(Vec<CharRange>),
}

impl MatchResult {
    /// All occurrences in left-to-right order
    pub fn ranges(&self) -> &[CharRange] {
        match self {
            Self::NotFound => &[],
            Self::Unique(range) => std::slice::from_ref(range),
            Self::Ambiguous(ranges) => ranges.as_slice(),
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// How the applier treats a target that occurs more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Reject with `AmbiguousMatch` so the caller can ask for disambiguation
    #[default]
    Reject,
    /// Edit the last (rightmost) occurrence
    PreferLast,
}

impl AmbiguityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::PreferLast => "prefer_last",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "reject" => Some(Self::Reject),
            "prefer_last" => Some(Self::PreferLast),
            _ => None,
        }
    }
}

/// Why a correction cycle left the buffer unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Target or anchor is absent from the buffer
    NoMatch,
    /// Target or anchor occurs more than once
    AmbiguousMatch,
    /// The utterance did not decode into exactly one well-formed operation
    InvalidOp,
    /// The remote decoder failed, timed out or was unreachable
    ServiceError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::AmbiguousMatch => "ambiguous_match",
            Self::InvalidOp => "invalid_op",
            Self::ServiceError => "service_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "no_match" => Some(Self::NoMatch),
            "ambiguous_match" => Some(Self::AmbiguousMatch),
            "invalid_op" => Some(Self::InvalidOp),
            "service_error" => Some(Self::ServiceError),
            _ => None,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying one edit to a buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied(String),
    Rejected(RejectReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The new buffer, if the edit was applied
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Applied(buffer) => Some(buffer),
            Self::Rejected(_) => None,
        }
    }
}

/// Classification of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceKind {
    Dictation,
    Correction,
}

impl UtteranceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dictation => "dictation",
            Self::Correction => "correction",
        }
    }
}

/// Which command decoder backend is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    /// Per-character labels from a sequence tagger
    TaggedSpan,
    /// Fixed command grammar
    #[default]
    Pattern,
    /// Remote language model
    FreeForm,
}

impl DecoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaggedSpan => "tagged_span",
            Self::Pattern => "pattern",
            Self::FreeForm => "free_form",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tagged_span" => Some(Self::TaggedSpan),
            "pattern" => Some(Self::Pattern),
            "free_form" => Some(Self::FreeForm),
            _ => None,
        }
    }

    /// Get all available decoders
    pub fn all() -> &'static [DecoderKind] {
        &[
            DecoderKind::TaggedSpan,
            DecoderKind::Pattern,
            DecoderKind::FreeForm,
        ]
    }
}

/// How new dictation is merged into the buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictationMode {
    /// Concatenate onto the existing buffer
    #[default]
    Append,
    /// The newest dictation becomes the whole buffer
    Replace,
}

impl DictationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "append" => Some(Self::Append),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Final status of one processed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Utterance was appended as dictation
    Dictated,
    /// A correction was applied
    Corrected,
    /// A correction was attempted and rejected; the buffer is unchanged
    Rejected(RejectReason),
}

impl CycleStatus {
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Diagnostics record for one processed utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: CycleId,
    pub kind: UtteranceKind,
    pub utterance: String,
    /// Decoder used, None for dictation
    pub decoder: Option<DecoderKind>,
    /// Decoded operation, None for dictation or a failed decode
    pub op: Option<EditOp>,
    pub status: CycleStatus,
    /// Buffer before the cycle
    pub before: String,
    /// Buffer after the cycle (equal to `before` when rejected)
    pub after: String,
    pub created_at: DateTime<Utc>,
}

impl CycleRecord {
    pub fn dictation(utterance: String, before: String, after: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: UtteranceKind::Dictation,
            utterance,
            decoder: None,
            op: None,
            status: CycleStatus::Dictated,
            before,
            after,
            created_at: Utc::now(),
        }
    }

    pub fn correction(
        utterance: String,
        decoder: DecoderKind,
        op: Option<EditOp>,
        status: CycleStatus,
        before: String,
        after: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: UtteranceKind::Correction,
            utterance,
            decoder: Some(decoder),
            op,
            status,
            before,
            after,
            created_at: Utc::now(),
        }
    }

    /// True if the buffer changed during this cycle
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}
