//! SQLite storage layer for settings and the correction cycle log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{CycleRecord, CycleStatus, DecoderKind, EditOp, RejectReason, UtteranceKind};

/// Storage backend using SQLite
pub struct Storage {
    conn: Mutex<Connection>,
}

pub const SETTING_OPENAI_API_KEY: &str = "openai_api_key";
pub const SETTING_GEMINI_API_KEY: &str = "gemini_api_key";
/// Completion provider for the free-form decoder: "gemini" (default) | "openai"
pub const SETTING_COMPLETION_PROVIDER: &str = "completion_provider";
pub const SETTING_COMPLETION_MODEL: &str = "completion_model";
/// Active decoder: "tagged_span" | "pattern" (default) | "free_form"
pub const SETTING_DECODER: &str = "decoder";
pub const SETTING_AMBIGUITY_POLICY: &str = "ambiguity_policy";
pub const SETTING_DICTATION_MODE: &str = "dictation_mode";
pub const SETTING_RESOLVE_REFERENCE_WORDS: &str = "resolve_reference_words";
pub const SETTING_FREE_FORM_TIMEOUT_MS: &str = "free_form_timeout_ms";

const CYCLE_COLUMNS: &str = "id, kind, utterance, decoder, op, status, reject_reason, \
                             text_before, text_after, created_at";

impl Storage {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS correction_cycles (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                utterance TEXT NOT NULL,
                decoder TEXT,
                op TEXT,
                status TEXT NOT NULL,
                reject_reason TEXT,
                text_before TEXT NOT NULL,
                text_after TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cycles_created ON correction_cycles(created_at);
            CREATE INDEX IF NOT EXISTS idx_cycles_reason ON correction_cycles(reject_reason);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    // ========== Settings ==========

    /// Save or update a setting value
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Get a setting value
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// Remove a setting. Returns true if it existed.
    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(rows_affected > 0)
    }

    // ========== Correction cycle log ==========

    /// Save one processed cycle
    pub fn save_cycle(&self, record: &CycleRecord) -> Result<()> {
        let op_json = record.op.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO correction_cycles ({CYCLE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                record.id.to_string(),
                record.kind.as_str(),
                record.utterance,
                record.decoder.map(|d| d.as_str()),
                op_json,
                status_name(record.status),
                record.status.reason().map(|r| r.as_str()),
                record.before,
                record.after,
                record.created_at.to_rfc3339(),
            ],
        )?;
        debug!("Saved cycle {}", record.id);
        Ok(())
    }

    /// Most recent cycles first
    pub fn get_recent_cycles(&self, limit: usize) -> Result<Vec<CycleRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CYCLE_COLUMNS} FROM correction_cycles \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;

        let cycles = stmt
            .query_map([limit as i64], cycle_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cycles)
    }

    /// Get the number of logged cycles
    pub fn get_cycle_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM correction_cycles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Get the number of cycles rejected for `reason`
    pub fn get_rejection_count(&self, reason: RejectReason) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM correction_cycles WHERE reject_reason = ?1",
            params![reason.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete the whole cycle log
    pub fn delete_all_cycles(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM correction_cycles", [])?;
        debug!("Deleted all cycles: {} rows affected", rows_affected);
        Ok(rows_affected)
    }
}

fn status_name(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Dictated => "dictated",
        CycleStatus::Corrected => "corrected",
        CycleStatus::Rejected(_) => "rejected",
    }
}

fn parse_status(status: &str, reason: Option<&str>) -> CycleStatus {
    match status {
        "dictated" => CycleStatus::Dictated,
        "corrected" => CycleStatus::Corrected,
        _ => CycleStatus::Rejected(
            reason
                .and_then(RejectReason::from_name)
                .unwrap_or(RejectReason::InvalidOp),
        ),
    }
}

fn parse_kind(kind: &str) -> UtteranceKind {
    match kind {
        "correction" => UtteranceKind::Correction,
        _ => UtteranceKind::Dictation,
    }
}

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<CycleRecord> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let decoder: Option<String> = row.get(3)?;
    let op_json: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let reason: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(9)?;

    let op = op_json.and_then(|json| {
        serde_json::from_str::<EditOp>(&json)
            .inspect_err(|e| warn!("Stored op for cycle {} is unreadable: {}", id, e))
            .ok()
    });

    Ok(CycleRecord {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::new_v4()),
        kind: parse_kind(&kind),
        utterance: row.get(2)?,
        decoder: decoder.as_deref().and_then(DecoderKind::from_name),
        op,
        status: parse_status(&status, reason.as_deref()),
        before: row.get(7)?,
        after: row.get(8)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
