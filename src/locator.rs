//! Span locator: finds where a correction's target sits in the buffer
//!
//! Matching is exact and character-wise. Byte offsets from the substring search are
//! converted to character indices so ranges stay valid for CJK and other multi-byte
//! text.
//!
//! When the needle occurs more than once the result is [`MatchResult::Ambiguous`].
//! The fallback resolution policy is the **last** occurrence: corrections usually
//! target the most recent mistake, which sits later in the buffer. The fallback is
//! only used when a caller asks for it through [`AmbiguityPolicy::PreferLast`].

use crate::types::{AmbiguityPolicy, CharRange, MatchResult, RejectReason};

/// Find every non-overlapping occurrence of `needle` in `buffer`, left to right.
///
/// An empty needle never matches.
pub fn locate(buffer: &str, needle: &str) -> MatchResult {
    if needle.is_empty() {
        return MatchResult::NotFound;
    }

    let needle_chars = char_len(needle);
    let mut ranges = Vec::new();
    let mut scanned_bytes = 0;
    let mut scanned_chars = 0;

    for (byte_start, _) in buffer.match_indices(needle) {
        scanned_chars += char_len(&buffer[scanned_bytes..byte_start]);
        scanned_bytes = byte_start;
        ranges.push(CharRange::new(scanned_chars, scanned_chars + needle_chars));
    }

    match ranges.len() {
        0 => MatchResult::NotFound,
        1 => MatchResult::Unique(ranges[0]),
        _ => MatchResult::Ambiguous(ranges),
    }
}

/// Number of characters (Unicode scalar values) in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

impl MatchResult {
    /// The rightmost occurrence, if any
    pub fn last_occurrence(&self) -> Option<CharRange> {
        self.ranges().last().copied()
    }

    /// Pick a single range according to `policy`
    pub fn resolve(&self, policy: AmbiguityPolicy) -> Result<CharRange, RejectReason> {
        match (self, policy) {
            (MatchResult::NotFound, _) => Err(RejectReason::NoMatch),
            (MatchResult::Unique(range), _) => Ok(*range),
            (MatchResult::Ambiguous(_), AmbiguityPolicy::Reject) => {
                Err(RejectReason::AmbiguousMatch)
            }
            (MatchResult::Ambiguous(_), AmbiguityPolicy::PreferLast) => self
                .last_occurrence()
                .ok_or(RejectReason::AmbiguousMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_match_uses_char_indices() {
        // "氣很" starts at char 3 but byte 9
        let result = locate("今天天氣很好", "氣很");
        assert_eq!(result, MatchResult::Unique(CharRange::new(3, 5)));
    }

    #[test]
    fn test_not_found() {
        assert_eq!(locate("今天天氣很好", "錯字"), MatchResult::NotFound);
        assert_eq!(locate("", "好"), MatchResult::NotFound);
    }

    #[test]
    fn test_empty_needle_never_matches() {
        assert_eq!(locate("今天", ""), MatchResult::NotFound);
    }

    #[test]
    fn test_ambiguous_ranges_left_to_right() {
        let result = locate("今天天氣很好", "天");
        assert_eq!(
            result,
            MatchResult::Ambiguous(vec![CharRange::new(1, 2), CharRange::new(2, 3)])
        );
    }

    #[test]
    fn test_occurrences_never_overlap() {
        // "天天" inside "天天天" counts once, starting at the left
        let result = locate("天天天", "天天");
        assert_eq!(result, MatchResult::Unique(CharRange::new(0, 2)));

        let result = locate("天天天天", "天天");
        assert_eq!(
            result,
            MatchResult::Ambiguous(vec![CharRange::new(0, 2), CharRange::new(2, 4)])
        );
    }

    #[test]
    fn test_mixed_width_text() {
        let result = locate("ok 好的 ok 好", "ok");
        assert_eq!(result.ranges(), &[CharRange::new(0, 2), CharRange::new(6, 8)]);
    }

    #[test]
    fn test_resolve_rejects_ambiguity_by_default() {
        let result = locate("好好", "好");
        assert_eq!(
            result.resolve(AmbiguityPolicy::default()),
            Err(RejectReason::AmbiguousMatch)
        );
    }

    #[test]
    fn test_resolve_prefers_rightmost_when_asked() {
        let result = locate("他說好，我也說好，大家都說好", "好");
        assert_eq!(
            result.resolve(AmbiguityPolicy::PreferLast),
            Ok(CharRange::new(13, 14))
        );
    }

    #[test]
    fn test_resolve_not_found_is_no_match() {
        assert_eq!(
            MatchResult::NotFound.resolve(AmbiguityPolicy::PreferLast),
            Err(RejectReason::NoMatch)
        );
    }

    #[test]
    fn test_every_reported_range_spells_the_needle() {
        let buffer = "我的我的我們的朋友我的";
        let needle = "我的";
        let chars: Vec<char> = buffer.chars().collect();
        let result = locate(buffer, needle);

        assert_eq!(result.ranges().len(), 3);
        for range in result.ranges() {
            let found: String = chars[range.start..range.end].iter().collect();
            assert_eq!(found, needle);
        }
        // and the count agrees with the plain substring count
        assert_eq!(result.ranges().len(), buffer.matches(needle).count());
    }
}
