//! FFI layer for native host integration
//!
//! Provides C-compatible functions that can be called from Swift or C.
//! Uses opaque pointers and C strings for cross-language compatibility.

// FFI functions necessarily work with raw pointers - this is expected behavior
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{debug, error, warn};

use crate::config::{CompletionProviderKind, EngineConfig};
use crate::engine::CorrectionEngine;
use crate::error::Result;
use crate::session::SessionState;
use crate::storage::Storage;
use crate::types::{DecoderKind, SpanLabel, Utterance};

/// Opaque handle to the correction engine
pub struct FlowEditHandle {
    runtime: Runtime,
    storage: Storage,
    config: Mutex<EngineConfig>,
    engine: Mutex<Arc<CorrectionEngine>>,
    session: Mutex<SessionState>,
    last_error: Mutex<Option<String>>,
}

fn set_last_error(handle: &FlowEditHandle, message: impl Into<String>) {
    *handle.last_error.lock() = Some(message.into());
}

fn clear_last_error(handle: &FlowEditHandle) {
    *handle.last_error.lock() = None;
}

fn to_c_string(text: String) -> *mut c_char {
    match CString::new(text) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_json_c_string<T: Serialize>(handle: &FlowEditHandle, value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_c_string(json),
        Err(e) => {
            error!("Failed to serialize FFI result: {}", e);
            set_last_error(handle, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Borrow a C string, None for null or invalid UTF-8
fn read_c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn decoder_from_u8(kind: u8) -> Option<DecoderKind> {
    match kind {
        0 => Some(DecoderKind::TaggedSpan),
        1 => Some(DecoderKind::Pattern),
        2 => Some(DecoderKind::FreeForm),
        _ => None,
    }
}

fn decoder_to_u8(kind: DecoderKind) -> u8 {
    match kind {
        DecoderKind::TaggedSpan => 0,
        DecoderKind::Pattern => 1,
        DecoderKind::FreeForm => 2,
    }
}

fn provider_from_u8(provider: u8) -> Option<CompletionProviderKind> {
    match provider {
        0 => Some(CompletionProviderKind::Gemini),
        1 => Some(CompletionProviderKind::OpenAI),
        _ => None,
    }
}

fn build_engine(storage: &Storage, config: &EngineConfig) -> Result<CorrectionEngine> {
    let provider = config.completion_provider(storage)?;
    CorrectionEngine::from_config(config, provider)
}

// ============ Lifecycle ============

/// Initialize the correction engine
/// Returns an opaque handle that must be passed to all other functions
/// Returns null on failure
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_init(db_path: *const c_char) -> *mut FlowEditHandle {
    let db_path = if db_path.is_null() {
        // default to app support directory
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flow-edit")
            .join("flow-edit.db")
    } else {
        match read_c_str(db_path) {
            Some(s) => PathBuf::from(s),
            None => return ptr::null_mut(),
        }
    };

    let runtime = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create async runtime: {}", e);
            return ptr::null_mut();
        }
    };

    let storage = match Storage::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open storage: {}", e);
            return ptr::null_mut();
        }
    };

    let mut startup_error = None;

    let config = EngineConfig::load(&storage).unwrap_or_else(|e| {
        warn!("Ignoring stored config: {}", e);
        startup_error = Some(e.to_string());
        EngineConfig::default()
    });

    let engine = match build_engine(&storage, &config) {
        Ok(engine) => engine,
        Err(e) => {
            // typically free-form decoding without an API key
            warn!("Falling back to pattern decoder: {}", e);
            startup_error = Some(e.to_string());
            let fallback = EngineConfig {
                decoder: DecoderKind::Pattern,
                ..config.clone()
            };
            match CorrectionEngine::from_config(&fallback, None) {
                Ok(engine) => engine,
                Err(e) => {
                    error!("Failed to build correction engine: {}", e);
                    return ptr::null_mut();
                }
            }
        }
    };

    let handle = FlowEditHandle {
        runtime,
        storage,
        config: Mutex::new(config),
        engine: Mutex::new(Arc::new(engine)),
        session: Mutex::new(SessionState::new()),
        last_error: Mutex::new(startup_error),
    };

    debug!("Correction engine initialized");

    Box::into_raw(Box::new(handle))
}

/// Destroy the engine and free resources
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_destroy(handle: *mut FlowEditHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
        debug!("Correction engine destroyed");
    }
}

// ============ Cycles ============

/// Process one recognized utterance
/// `labels` is optional (null or empty): whitespace-separated tags such as "O B-Modify"
/// Returns the cycle record as JSON (caller must free with flow_edit_free_string)
/// Returns null on invalid input
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_process(
    handle: *mut FlowEditHandle,
    text: *const c_char,
    labels: *const c_char,
) -> *mut c_char {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };

    let Some(text) = read_c_str(text) else {
        set_last_error(handle, "Utterance text is null or not UTF-8");
        return ptr::null_mut();
    };

    let mut utterance = Utterance::new(text);
    if let Some(tags) = read_c_str(labels).filter(|t| !t.trim().is_empty()) {
        match SpanLabel::parse_sequence(tags) {
            Some(parsed) => utterance = utterance.with_labels(parsed),
            None => {
                set_last_error(handle, format!("Unknown label in '{}'", tags));
                return ptr::null_mut();
            }
        }
    }

    let engine = handle.engine.lock().clone();
    let record = {
        let mut session = handle.session.lock();
        handle
            .runtime
            .block_on(engine.process(&mut session, &utterance))
    };

    match record.status.reason() {
        Some(reason) => set_last_error(handle, reason.as_str()),
        None => clear_last_error(handle),
    }

    if let Err(e) = handle.storage.save_cycle(&record) {
        error!("Failed to log cycle {}: {}", record.id, e);
    }

    to_json_c_string(handle, &record)
}

/// Get the current buffer (caller must free with flow_edit_free_string)
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_current_text(handle: *mut FlowEditHandle) -> *mut c_char {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };
    to_c_string(handle.session.lock().buffer().to_string())
}

/// Replace the buffer, e.g. after the user edited text by hand
/// Null resets to an empty buffer
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_reset(handle: *mut FlowEditHandle, text: *const c_char) -> bool {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return false;
    };
    let text = if text.is_null() {
        ""
    } else {
        match read_c_str(text) {
            Some(s) => s,
            None => {
                set_last_error(handle, "Text is not UTF-8");
                return false;
            }
        }
    };
    handle.session.lock().reset(text);
    clear_last_error(handle);
    true
}

/// Undo the last applied correction
/// Returns the restored buffer, or null if there is nothing to undo
/// (caller must free with flow_edit_free_string)
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_undo(handle: *mut FlowEditHandle) -> *mut c_char {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };
    match handle.session.lock().undo() {
        Some(transition) => to_c_string(transition.current),
        None => ptr::null_mut(),
    }
}

// ============ Configuration ============

/// Switch the active decoder
/// kind: 0 = tagged span, 1 = pattern, 2 = free-form
/// Returns true if the decoder was switched; the choice is persisted
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_set_decoder(handle: *mut FlowEditHandle, kind: u8) -> bool {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return false;
    };
    let Some(decoder) = decoder_from_u8(kind) else {
        set_last_error(handle, format!("Unknown decoder kind {}", kind));
        return false;
    };

    let mut config = handle.config.lock();
    let updated = EngineConfig {
        decoder,
        ..config.clone()
    };

    let engine = match build_engine(&handle.storage, &updated) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to switch decoder to {}: {}", decoder.as_str(), e);
            set_last_error(handle, e.to_string());
            return false;
        }
    };

    if let Err(e) = updated.save(&handle.storage) {
        error!("Failed to persist decoder choice: {}", e);
        set_last_error(handle, e.to_string());
        return false;
    }

    *handle.engine.lock() = Arc::new(engine);
    *config = updated;
    clear_last_error(handle);
    debug!("Switched decoder to {}", decoder.as_str());
    true
}

/// Get the active decoder (0 = tagged span, 1 = pattern, 2 = free-form)
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_get_decoder(handle: *mut FlowEditHandle) -> u8 {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return decoder_to_u8(DecoderKind::default());
    };
    decoder_to_u8(handle.engine.lock().decoder_kind())
}

/// Store an API key and make that provider the free-form backend
/// provider: 0 = Gemini, 1 = OpenAI
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_set_api_key(
    handle: *mut FlowEditHandle,
    provider: u8,
    api_key: *const c_char,
) -> bool {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return false;
    };
    let Some(provider) = provider_from_u8(provider) else {
        set_last_error(handle, format!("Unknown provider {}", provider));
        return false;
    };
    let Some(api_key) = read_c_str(api_key) else {
        set_last_error(handle, "API key is null or not UTF-8");
        return false;
    };

    if let Err(e) = handle
        .storage
        .set_setting(provider.api_key_setting(), api_key)
    {
        error!("Failed to save API key: {}", e);
        set_last_error(handle, e.to_string());
        return false;
    }

    let mut config = handle.config.lock();
    config.completion_provider = provider;
    if let Err(e) = config.save(&handle.storage) {
        error!("Failed to persist provider choice: {}", e);
        set_last_error(handle, e.to_string());
        return false;
    }

    match build_engine(&handle.storage, &config) {
        Ok(engine) => {
            *handle.engine.lock() = Arc::new(engine);
            clear_last_error(handle);
            debug!("Set completion provider to {}", provider.as_str());
            true
        }
        Err(e) => {
            error!("Failed to rebuild engine: {}", e);
            set_last_error(handle, e.to_string());
            false
        }
    }
}

// ============ Diagnostics ============

/// Get recent cycles as JSON, newest first (caller must free with flow_edit_free_string)
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_get_recent_cycles_json(
    handle: *mut FlowEditHandle,
    limit: usize,
) -> *mut c_char {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };
    match handle.storage.get_recent_cycles(limit) {
        Ok(cycles) => to_json_c_string(handle, &cycles),
        Err(e) => {
            error!("Failed to load cycles: {}", e);
            set_last_error(handle, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Get the last error message (caller must free with flow_edit_free_string)
/// Rejected cycles report their reason here, e.g. "ambiguous_match"
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_get_last_error(handle: *mut FlowEditHandle) -> *mut c_char {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };
    let message = handle.last_error.lock().clone();
    match message {
        Some(text) => to_c_string(text),
        None => ptr::null_mut(),
    }
}

// ============ Utilities ============

/// Free a string returned by flow_edit functions
#[unsafe(no_mangle)]
pub extern "C" fn flow_edit_free_string(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}
