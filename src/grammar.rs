//! Spoken command grammar
//!
//! Fixed templates for the four correction forms. Templates are tried in priority
//! order and the first match wins. Captures are non-greedy, so the target is the
//! shortest text that lets the rest of the template match.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::EditOp;

/// Sentence punctuation that recognizers tack onto the end of an utterance
const TRAILING_PUNCTUATION: &[char] = &['。', '，', '！', '？', '.', ',', '!', '?'];

const REFERENCE_MARKER: char = '的';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandForm {
    Delete,
    Replace,
    InsertBefore,
    InsertAfter,
}

struct CommandTemplate {
    form: CommandForm,
    regex: Regex,
}

/// Primary templates first, then the alternate phrasings of each family
static TEMPLATES: LazyLock<Vec<CommandTemplate>> = LazyLock::new(|| {
    [
        (CommandForm::Delete, r"^(?:刪|删)除(.+?)$"),
        (CommandForm::Replace, r"^把(.+?)改成(.+)$"),
        (CommandForm::InsertBefore, r"^在(.+?)前面新增(.+)$"),
        (CommandForm::InsertAfter, r"^在(.+?)(?:後|后)面新增(.+)$"),
        (CommandForm::Delete, r"^(?:刪|删)掉(.+?)$"),
        (CommandForm::Delete, r"^把(.+?)(?:刪|删)(?:掉|除)$"),
        (CommandForm::Replace, r"^把(.+?)(?:換|换)成(.+)$"),
        (
            CommandForm::InsertBefore,
            r"^(?:請|请)?在(.+?)前面(?:新增|加入|加上|加)(.+)$",
        ),
        (
            CommandForm::InsertAfter,
            r"^(?:請|请)?在(.+?)(?:後|后)面(?:新增|加入|加上|加)(.+)$",
        ),
    ]
    .into_iter()
    .map(|(form, pattern)| CommandTemplate {
        form,
        regex: Regex::new(pattern).expect("command template is a valid regex"),
    })
    .collect()
});

/// Options that change how captures are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrammarOptions {
    /// Resolve "X的Y" captures to the single character they describe
    pub resolve_reference_words: bool,
}

/// Strip surrounding whitespace and trailing sentence punctuation
pub fn normalize(text: &str) -> &str {
    text.trim()
        .trim_end_matches(|c: char| TRAILING_PUNCTUATION.contains(&c) || c.is_whitespace())
}

/// True if the text matches any command template
///
/// # Examples
/// ```
/// use flow_edit::grammar::is_command;
///
/// assert!(is_command("把器改成氣"));
/// assert!(is_command("刪除錯字。"));
/// assert!(!is_command("今天天氣很好"));
/// ```
pub fn is_command(text: &str) -> bool {
    let text = normalize(text);
    TEMPLATES.iter().any(|t| t.regex.is_match(text))
}

/// Parse a command utterance into an edit operation.
///
/// Returns None when no template matches or a capture is blank.
pub fn parse(text: &str, options: GrammarOptions) -> Option<EditOp> {
    let text = normalize(text);

    for template in TEMPLATES.iter() {
        let Some(caps) = template.regex.captures(text) else {
            continue;
        };

        let capture = |index: usize| -> Option<String> {
            let raw = caps.get(index)?.as_str().trim();
            if raw.is_empty() {
                return None;
            }
            if options.resolve_reference_words {
                Some(resolve_reference_word(raw))
            } else {
                Some(raw.to_string())
            }
        };

        let op = match template.form {
            CommandForm::Delete => EditOp::delete(capture(1)?),
            CommandForm::Replace => EditOp::replace(capture(1)?, capture(2)?),
            CommandForm::InsertBefore => EditOp::insert_before(capture(1)?, capture(2)?),
            CommandForm::InsertAfter => EditOp::insert_after(capture(1)?, capture(2)?),
        };
        debug!("Command '{}' parsed as {}", text, op);
        return Some(op);
    }

    None
}

/// Resolve "reference word 的 character" to the character.
///
/// "欣賞的欣" names 欣. If the stated character is not in the reference word the
/// recognizer probably misheard it, so the first character of the reference word is
/// used instead. Text without the marker is returned unchanged.
///
/// # Examples
/// ```
/// use flow_edit::grammar::resolve_reference_word;
///
/// assert_eq!(resolve_reference_word("欣賞的欣"), "欣");
/// assert_eq!(resolve_reference_word("欣賞的新"), "欣");
/// assert_eq!(resolve_reference_word("錯字"), "錯字");
/// ```
pub fn resolve_reference_word(text: &str) -> String {
    let Some((reference, character)) = text.rsplit_once(REFERENCE_MARKER) else {
        return text.to_string();
    };
    if reference.is_empty() || character.is_empty() {
        return text.to_string();
    }

    if reference.contains(character) {
        character.to_string()
    } else {
        reference
            .chars()
            .next()
            .map(String::from)
            .unwrap_or_else(|| text.to_string())
    }
}
