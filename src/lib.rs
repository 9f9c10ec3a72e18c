//! Flow Edit - spoken correction commands for dictated text
//!
//! Classifies each recognized utterance as new dictation or a correction command,
//! decodes commands into structured edits with one of three interchangeable backends
//! (sequence-tagger labels, a fixed command grammar, or a chat model), and applies
//! them to the dictated buffer with deterministic span matching.

pub mod applier;
pub mod classifier;
pub mod config;
pub mod decoders;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod grammar;
pub mod locator;
pub mod providers;
pub mod session;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

// Export FFI functions at crate root for C header generation
pub use ffi::*;

/// Re-export the main engine components for convenience
pub use applier::{AppliedEdit, apply, apply_edit, apply_with_policy};
pub use classifier::Classifier;
pub use config::{CompletionProviderKind, EngineConfig};
pub use decoders::{Decoder, FreeFormDecoder, PatternDecoder, TaggedSpanDecoder};
pub use engine::{CorrectionEngine, TypingSink};
pub use locator::locate;
pub use providers::CompletionProvider;
pub use session::{SessionState, Transition};
pub use storage::Storage;
