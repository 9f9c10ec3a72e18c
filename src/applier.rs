//! Edit applier: turns a decoded [`EditOp`] into a new buffer
//!
//! The applier never mutates in place. Every successful application builds a fresh
//! `String` from the untouched prior buffer, so the caller can still diff old against
//! new. Ambiguous targets are rejected unless the caller explicitly opts into
//! [`AmbiguityPolicy::PreferLast`].

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::locator::{char_len, locate};
use crate::types::{AmbiguityPolicy, ApplyOutcome, CharRange, EditOp, RejectReason};

/// A successfully applied edit, with enough detail to undo it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub op: EditOp,
    /// Range of the prior buffer that was removed; empty (at the insertion point) for inserts
    pub range: CharRange,
    /// Text removed from the prior buffer
    pub removed: String,
    /// Text written at `range.start`
    pub inserted: String,
    /// The resulting buffer
    pub buffer: String,
}

impl AppliedEdit {
    /// Range the inserted text occupies in the resulting buffer
    pub fn inserted_range(&self) -> CharRange {
        CharRange::new(
            self.range.start,
            self.range.start + char_len(&self.inserted),
        )
    }
}

/// Apply `op` to `buffer`, rejecting ambiguous targets
pub fn apply(buffer: &str, op: &EditOp) -> ApplyOutcome {
    apply_with_policy(buffer, op, AmbiguityPolicy::Reject)
}

/// Apply `op` to `buffer` with an explicit ambiguity policy
pub fn apply_with_policy(buffer: &str, op: &EditOp, policy: AmbiguityPolicy) -> ApplyOutcome {
    match apply_edit(buffer, op, policy) {
        Ok(edit) => ApplyOutcome::Applied(edit.buffer),
        Err(reason) => ApplyOutcome::Rejected(reason),
    }
}

/// Resolve the op's target or anchor and build the new buffer.
///
/// An op that violates the data-model invariants (empty target or payload) means a
/// decoder bug; it panics in debug builds and is rejected as `InvalidOp` otherwise.
pub fn apply_edit(
    buffer: &str,
    op: &EditOp,
    policy: AmbiguityPolicy,
) -> Result<AppliedEdit, RejectReason> {
    if let Err(problem) = op.validate() {
        error!("Malformed edit op reached the applier: {} ({})", op, problem);
        if cfg!(debug_assertions) {
            panic!("malformed edit op reached the applier: {problem}");
        }
        return Err(RejectReason::InvalidOp);
    }

    let located = locate(buffer, op.locus());
    let found = located.resolve(policy).inspect_err(|reason| {
        debug!(
            "Cannot {}: '{}' matched {} time(s) -> {}",
            op.name(),
            op.locus(),
            located.ranges().len(),
            reason
        );
    })?;

    let (range, inserted) = match op {
        EditOp::Delete { .. } => (found, ""),
        EditOp::Replace { replacement, .. } => (found, replacement.as_str()),
        EditOp::InsertBefore { content, .. } => {
            (CharRange::new(found.start, found.start), content.as_str())
        }
        EditOp::InsertAfter { content, .. } => {
            (CharRange::new(found.end, found.end), content.as_str())
        }
    };

    let (removed, new_buffer) = splice(buffer, range, inserted);
    debug!("Applied {} at {}..{}", op, range.start, range.end);

    Ok(AppliedEdit {
        op: op.clone(),
        range,
        removed,
        inserted: inserted.to_string(),
        buffer: new_buffer,
    })
}

/// Replace the characters in `range` with `insert`.
///
/// Returns the removed text and the new buffer. Indices past the end clamp to the end.
pub(crate) fn splice(buffer: &str, range: CharRange, insert: &str) -> (String, String) {
    let start = byte_offset(buffer, range.start);
    let end = byte_offset(buffer, range.end).max(start);

    let mut out = String::with_capacity(buffer.len() - (end - start) + insert.len());
    out.push_str(&buffer[..start]);
    out.push_str(insert);
    out.push_str(&buffer[end..]);

    (buffer[start..end].to_string(), out)
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_homophone() {
        let outcome = apply("今天天器很好", &EditOp::replace("器", "氣"));
        assert_eq!(outcome, ApplyOutcome::Applied("今天天氣很好".to_string()));
    }

    #[test]
    fn test_delete_character() {
        let outcome = apply("今天天氣很好", &EditOp::delete("很"));
        assert_eq!(outcome, ApplyOutcome::Applied("今天天氣好".to_string()));
    }

    #[test]
    fn test_insert_before() {
        let outcome = apply("今天好", &EditOp::insert_before("好", "很"));
        assert_eq!(outcome, ApplyOutcome::Applied("今天很好".to_string()));
    }

    #[test]
    fn test_insert_after_unique_anchor() {
        let outcome = apply("今天氣好", &EditOp::insert_after("天", "氣"));
        assert_eq!(outcome, ApplyOutcome::Applied("今天氣氣好".to_string()));
    }

    #[test]
    fn test_insert_after_repeated_anchor_is_ambiguous() {
        let outcome = apply("今天天氣好", &EditOp::insert_after("天", "氣"));
        assert_eq!(outcome, ApplyOutcome::Rejected(RejectReason::AmbiguousMatch));
    }

    #[test]
    fn test_missing_target_is_no_match() {
        let outcome = apply("今天天氣很好", &EditOp::delete("錯字"));
        assert_eq!(outcome, ApplyOutcome::Rejected(RejectReason::NoMatch));
    }

    #[test]
    fn test_prefer_last_edits_rightmost_occurrence() {
        let outcome = apply_with_policy(
            "好的，好的",
            &EditOp::replace("好", "對"),
            AmbiguityPolicy::PreferLast,
        );
        assert_eq!(outcome, ApplyOutcome::Applied("好的，對的".to_string()));
    }

    #[test]
    fn test_delete_length_arithmetic() {
        let buffer = "我們明天下午三點開會";
        let target = "下午";
        let outcome = apply(buffer, &EditOp::delete(target));
        let new_buffer = outcome.buffer().unwrap();
        assert_eq!(char_len(new_buffer), char_len(buffer) - char_len(target));
        assert_eq!(new_buffer, "我們明天三點開會");
    }

    #[test]
    fn test_replace_length_arithmetic() {
        let buffer = "請把報告寄給王經理";
        let outcome = apply(buffer, &EditOp::replace("王經理", "陳總"));
        let new_buffer = outcome.buffer().unwrap();
        assert_eq!(new_buffer, "請把報告寄給陳總");
        assert_eq!(char_len(new_buffer), char_len(buffer) - 3 + 2);
    }

    #[test]
    fn test_reapplying_delete_reports_no_match() {
        let op = EditOp::delete("很");
        let first = apply("今天天氣很好", &op);
        let second = apply(first.buffer().unwrap(), &op);
        assert_eq!(second, ApplyOutcome::Rejected(RejectReason::NoMatch));
    }

    #[test]
    fn test_replace_round_trip_restores_buffer() {
        let original = "這首擱淺的歌";
        let forward = apply(original, &EditOp::replace("擱淺", "歌頌"));
        // "歌" now appears twice but "歌頌" is unique
        let back = apply(forward.buffer().unwrap(), &EditOp::replace("歌頌", "擱淺"));
        assert_eq!(back.buffer(), Some(original));
    }

    #[test]
    fn test_applied_edit_records_undo_details() {
        let edit =
            apply_edit("天氣好", &EditOp::insert_after("天氣", "很"), AmbiguityPolicy::Reject)
                .unwrap();
        assert_eq!(edit.buffer, "天氣很好");
        assert_eq!(edit.range, CharRange::new(2, 2));
        assert_eq!(edit.removed, "");
        assert_eq!(edit.inserted_range(), CharRange::new(2, 3));
    }

    #[test]
    fn test_mixed_script_buffer() {
        let outcome = apply("meeting 在 3pm 開始", &EditOp::replace("3pm", "四點"));
        assert_eq!(outcome.buffer(), Some("meeting 在 四點 開始"));
    }

    #[test]
    fn test_splice_clamps_past_end() {
        let (removed, out) = splice("天氣", CharRange::new(2, 2), "好");
        assert_eq!(removed, "");
        assert_eq!(out, "天氣好");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "malformed edit op")]
    fn test_empty_target_aborts_in_debug_builds() {
        let _ = apply("今天", &EditOp::delete(""));
    }
}
