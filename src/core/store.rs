//! SQLite persistence for the validation ledger.
//!
//! Writes are upserts guarded by `recorded_at`, so an older run finishing late
//! never overwrites a newer entry. Ties go to the incoming write.

use crate::core::digest::Fingerprint;
use crate::core::error::ProverGateError;
use crate::core::ledger::{Ledger, LedgerEntry, LedgerUpdate, ValidationKind};
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};

pub const LEDGER_DB_NAME: &str = "ledger.db";

const LEDGER_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS validation_ledger (
    kind TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
)";

const UPSERT_ENTRY: &str = "INSERT INTO validation_ledger (kind, fingerprint, recorded_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(kind) DO UPDATE SET
    fingerprint = excluded.fingerprint,
    recorded_at = excluded.recorded_at
WHERE excluded.recorded_at >= validation_ledger.recorded_at";

pub fn db_connect(db_path: &Path) -> Result<Connection, ProverGateError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

pub fn ledger_db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LEDGER_DB_NAME)
}

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Open (creating if needed) the ledger database inside `state_dir`.
    pub fn open(state_dir: &Path) -> Result<Self, ProverGateError> {
        fs::create_dir_all(state_dir).map_err(ProverGateError::IoError)?;
        let conn = db_connect(&ledger_db_path(state_dir))?;
        conn.execute(LEDGER_SCHEMA, [])?;
        Ok(LedgerStore { conn })
    }

    pub fn load(&self) -> Result<Ledger, ProverGateError> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, fingerprint, recorded_at FROM validation_ledger ORDER BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut entries = LedgerUpdate::new();
        for row in rows {
            let (kind, fingerprint, recorded_at) = row?;
            let kind: ValidationKind = kind.parse()?;
            entries.insert(
                kind,
                LedgerEntry {
                    fingerprint: Fingerprint::new(fingerprint),
                    recorded_at,
                },
            );
        }
        Ok(Ledger::from(entries))
    }

    /// Merge `update` into the stored ledger and return the result.
    pub fn merge(&self, update: &LedgerUpdate) -> Result<Ledger, ProverGateError> {
        let tx = self.conn.unchecked_transaction()?;
        for (kind, entry) in update {
            tx.execute(
                UPSERT_ENTRY,
                params![kind.as_str(), entry.fingerprint.as_str(), entry.recorded_at],
            )?;
        }
        tx.commit()?;
        self.load()
    }
}
