//! Specifier ledger: durable specifier → node identity mapping.
//!
//! The ledger is the cross-transaction dedup point. The first writer to
//! commit a specifier wins its identity through the conditional insert;
//! every later writer reads that identity back and reuses it.

use log::debug;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

use crate::metrics::{
    LEDGER_GET_TOTAL, LEDGER_LATENCY_SECONDS, LEDGER_PUT_CONDITION_FAILED_TOTAL, LEDGER_PUT_TOTAL,
};

/// Failures of a ledger call. The specific file is skipped; other files
/// proceed. A conditional-insert miss is not an error.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger database error")]
    Db(#[from] rusqlite::Error),
}

/// Result of a conditional insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// The key already had an identity; the existing one stands.
    AlreadyExists,
}

/// Conditional-insert / consistent-read KV of `key → uid`. Keys are file
/// specifiers, module names, and `name@version` strings.
pub trait SpecifierLedger: Send + Sync {
    fn put(&self, key: &str, uid: &str) -> Result<PutOutcome, LedgerError>;
    fn get(&self, key: &str) -> Result<Option<String>, LedgerError>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS specifiers (
    specifier TEXT PRIMARY KEY,
    uid TEXT NOT NULL
) WITHOUT ROWID;";

const WAL_PRAGMAS: &str = "PRAGMA synchronous = NORMAL;";

const INSERT_SQL: &str =
    "INSERT INTO specifiers (specifier, uid) VALUES (?1, ?2) ON CONFLICT(specifier) DO NOTHING";

/// SQLite-backed ledger. A single connection behind a mutex; WAL keeps
/// concurrent readers cheap across processes.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create the ledger DB and ensure schema + WAL (idempotent).
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(WAL_PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteLedger {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory ledger with the same schema (no WAL needed).
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteLedger {
            conn: Mutex::new(conn),
        })
    }
}

impl SpecifierLedger for SqliteLedger {
    fn put(&self, key: &str, uid: &str) -> Result<PutOutcome, LedgerError> {
        let start = Instant::now();
        LEDGER_PUT_TOTAL.inc();
        let result = self
            .conn
            .lock()
            .unwrap()
            .execute(INSERT_SQL, (key, uid))
            .map_err(LedgerError::from);
        LEDGER_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        match result? {
            0 => {
                LEDGER_PUT_CONDITION_FAILED_TOTAL.inc();
                debug!("{} already exists, nothing to do", key);
                Ok(PutOutcome::AlreadyExists)
            }
            _ => Ok(PutOutcome::Inserted),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let start = Instant::now();
        LEDGER_GET_TOTAL.inc();
        let result = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT uid FROM specifiers WHERE specifier = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(LedgerError::from(other)),
            });
        LEDGER_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        result
    }
}
