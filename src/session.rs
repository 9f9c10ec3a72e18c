//! Session state: the committed buffer and the last applied edit
//!
//! The state is an explicit value owned by the caller and threaded through each cycle.
//! Every change produces a [`Transition`] holding the old and new buffer so the typing
//! collaborator can rewrite what is on screen.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::applier::{AppliedEdit, splice};
use crate::types::DictationMode;

/// Before and after text of one buffer change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub previous: String,
    pub current: String,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    buffer: String,
    last_edit: Option<AppliedEdit>,
}

impl SessionState {
    /// Start with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: impl Into<String>) -> Self {
        Self {
            buffer: buffer.into(),
            last_edit: None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn last_edit(&self) -> Option<&AppliedEdit> {
        self.last_edit.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.last_edit.is_some()
    }

    /// Add dictated text. New dictation clears the undo slot.
    pub fn append_dictation(&mut self, text: &str, mode: DictationMode) -> Transition {
        let current = match mode {
            DictationMode::Append => format!("{}{}", self.buffer, text),
            DictationMode::Replace => text.to_string(),
        };
        self.last_edit = None;
        self.replace_buffer(current)
    }

    /// Commit an edit produced by the applier against the current buffer
    pub fn commit(&mut self, edit: AppliedEdit) -> Transition {
        let transition = self.replace_buffer(edit.buffer.clone());
        self.last_edit = Some(edit);
        transition
    }

    /// Revert the last committed edit. Returns None if there is nothing to undo.
    pub fn undo(&mut self) -> Option<Transition> {
        let edit = self.last_edit.take()?;
        let (_, restored) = splice(&self.buffer, edit.inserted_range(), &edit.removed);
        debug!("Undoing {}", edit.op);
        Some(self.replace_buffer(restored))
    }

    /// Overwrite the buffer, e.g. after the user edited text by hand
    pub fn reset(&mut self, text: impl Into<String>) -> Transition {
        self.last_edit = None;
        self.replace_buffer(text.into())
    }

    fn replace_buffer(&mut self, current: String) -> Transition {
        let previous = std::mem::replace(&mut self.buffer, current);
        Transition {
            previous,
            current: self.buffer.clone(),
        }
    }
}
