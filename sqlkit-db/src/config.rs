//! Connection settings applied right after open.
//!
//! [`ConnectionConfig`] is plain serde data, so it can live in whatever
//! configuration file the application already loads:
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config: sqlkit_db::ConnectionConfig = serde_json::from_str(
//!     r#"{ "busy_timeout_ms": 5000, "journal_mode": "wal", "synchronous": "full" }"#,
//! )?;
//! assert!(config.foreign_keys);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::connection::Connection;
use super::error::DbResult;

/// `PRAGMA journal_mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Delete the rollback journal at the end of each transaction.
    Delete,
    /// Truncate the rollback journal instead of deleting it.
    Truncate,
    /// Overwrite the journal header instead of deleting the file.
    Persist,
    /// Keep the rollback journal in memory.
    Memory,
    /// Write-ahead log; readers proceed concurrently with one writer.
    Wal,
    /// No journal. Rollback and crash recovery are unavailable.
    Off,
}

impl JournalMode {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

/// `PRAGMA synchronous` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    /// Hand data to the OS without syncing.
    Off,
    /// Sync at the most critical moments.
    Normal,
    /// Sync before every commit is reported.
    Full,
    /// Like `Full`, and also sync the directory after unlinking a journal.
    Extra,
}

impl Synchronous {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }
}

/// Per-connection settings. Missing fields take their defaults, which
/// leave every engine setting alone except `foreign_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Busy timeout in milliseconds; `None` keeps the engine default (off).
    pub busy_timeout_ms: Option<u64>,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
    /// Journal mode to switch to.
    pub journal_mode: Option<JournalMode>,
    /// Sync level.
    pub synchronous: Option<Synchronous>,
    /// Overwrite deleted content with zeroes.
    pub secure_delete: Option<bool>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: None,
            foreign_keys: true,
            journal_mode: None,
            synchronous: None,
            secure_delete: None,
        }
    }
}

impl ConnectionConfig {
    /// Applies the settings to `conn`.
    ///
    /// Returns the journal mode the engine reports after the switch, when one
    /// was requested. It can differ from the request: in-memory databases,
    /// for example, stay in `memory` mode.
    ///
    /// # Errors
    ///
    /// Propagates the first failing PRAGMA.
    pub fn apply(&self, conn: &Connection) -> DbResult<Option<String>> {
        if let Some(ms) = self.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(ms))?;
        }

        let mut pragmas = format!("PRAGMA foreign_keys = {};", on_off(self.foreign_keys));
        if let Some(sync) = self.synchronous {
            pragmas.push_str(&format!("PRAGMA synchronous = {};", sync.as_sql()));
        }
        conn.execute_batch(&pragmas)?;

        // secure_delete and journal_mode answer with the setting now in
        // effect, so they cannot go through execute_batch.
        if let Some(secure) = self.secure_delete {
            conn.query_row(
                &format!("PRAGMA secure_delete = {};", on_off(secure)),
                (),
                |row| row.get::<i64, _>(0),
            )?;
        }
        let journal = match self.journal_mode {
            Some(mode) => Some(conn.query_row(
                &format!("PRAGMA journal_mode = {};", mode.as_sql()),
                (),
                |row| row.get::<String, _>(0),
            )?),
            None => None,
        };
        debug!("applied connection config {self:?} (journal mode {journal:?})");
        Ok(journal)
    }
}

const fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Runs `PRAGMA integrity_check` and returns whether the database is healthy.
///
/// # Errors
///
/// Propagates the engine error if the check cannot run at all.
pub fn integrity_check(conn: &Connection) -> DbResult<bool> {
    let result = conn.query_row("PRAGMA integrity_check;", (), |row| {
        row.get::<String, _>(0)
    })?;
    Ok(result.trim() == "ok")
}
