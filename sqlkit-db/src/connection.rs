//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use std::ffi::c_int;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::time::Duration;

use log::{debug, trace};

use super::batch::Batch;
use super::config::ConnectionConfig;
use super::error::{DbError, DbResult};
use super::ffi::{self, RawDb, RawInterrupt};
use super::params::Params;
use super::row::Row;
use super::savepoint::Savepoint;
use super::statement::{Statement, StepResult};
use super::transaction::{Transaction, TransactionBehavior};

/// Flags passed to `sqlite3_open_v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    /// Open for reading only.
    pub const READ_ONLY: Self = Self(ffi::SQLITE_OPEN_READONLY);
    /// Open for reading and writing.
    pub const READ_WRITE: Self = Self(ffi::SQLITE_OPEN_READWRITE);
    /// Create the database file if it does not exist.
    pub const CREATE: Self = Self(ffi::SQLITE_OPEN_CREATE);
    /// Interpret the filename as a URI.
    pub const URI: Self = Self(ffi::SQLITE_OPEN_URI);
    /// Open an in-memory database.
    pub const MEMORY: Self = Self(ffi::SQLITE_OPEN_MEMORY);
    /// Multi-thread threading mode.
    pub const NO_MUTEX: Self = Self(ffi::SQLITE_OPEN_NOMUTEX);
    /// Serialized threading mode.
    pub const FULL_MUTEX: Self = Self(ffi::SQLITE_OPEN_FULLMUTEX);

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> c_int {
        self.0
    }

    /// `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::READ_WRITE | Self::CREATE | Self::URI | Self::FULL_MUTEX
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Interrupts long-running work on a connection from another thread.
///
/// Obtained from [`Connection::interrupt_handle`]. Once the connection is
/// closed, [`interrupt`](Self::interrupt) does nothing.
#[derive(Clone)]
pub struct InterruptHandle {
    raw: RawInterrupt,
}

impl InterruptHandle {
    /// Makes the connection's in-flight step fail with `SQLITE_INTERRUPT`.
    pub fn interrupt(&self) {
        self.raw.interrupt();
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle").finish_non_exhaustive()
    }
}

/// A `SQLite` database connection.
///
/// Closed when dropped, or explicitly with [`close`](Self::close). Not
/// `Sync` -- all access must happen from a single thread at a time.
pub struct Connection {
    db: RawDb,
}

impl Connection {
    /// Opens (or creates, with [`OpenFlags::CREATE`]) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns the engine error when the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> DbResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let db = RawDb::open(&path_str, flags.bits())?;
        debug!("opened sqlite database at {path_str}");
        Ok(Self { db })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns the engine error when the database cannot be opened.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(":memory:", OpenFlags::default())
    }

    /// Opens a database and applies `config` to it.
    ///
    /// # Errors
    ///
    /// Returns open failures and any error from [`ConnectionConfig::apply`].
    pub fn open_with_config(
        path: impl AsRef<Path>,
        flags: OpenFlags,
        config: &ConnectionConfig,
    ) -> DbResult<Self> {
        let conn = Self::open(path, flags)?;
        config.apply(&conn)?;
        Ok(conn)
    }

    /// Returns the raw database handle (for use in [`Statement`] etc.).
    pub(super) const fn raw(&self) -> &RawDb {
        &self.db
    }

    // ── execute_batch ───────────────────────────────────────────────────

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// Statements run in order. A statement that produces a row stops the
    /// batch with [`DbError::ExecuteReturnedResults`]; statements before it
    /// stay applied, since no transaction wraps the batch.
    ///
    /// # Errors
    ///
    /// Returns the first prepare, step, or row-producing failure.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        for stmt in self.batch(sql) {
            let mut stmt = stmt?;
            if stmt.step()? == StepResult::Row {
                return Err(DbError::ExecuteReturnedResults);
            }
        }
        Ok(())
    }

    /// Iterates over the statements in `sql` without running them.
    #[must_use]
    pub const fn batch<'sql>(&self, sql: &'sql str) -> Batch<'_, 'sql> {
        Batch::new(self, sql)
    }

    // ── prepare ─────────────────────────────────────────────────────────

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MultipleStatements`] if anything other than
    /// whitespace or comments follows the first statement, and
    /// [`DbError::EmptyStatement`] if there is no statement at all.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        trace!("preparing: {sql}");
        let (raw, consumed) = self.db.prepare(sql)?;
        let Some(raw) = raw else {
            return Err(DbError::EmptyStatement);
        };
        let tail = sql.get(consumed..).unwrap_or_default();
        if !tail.is_empty() && self.has_statement(tail) {
            return Err(DbError::MultipleStatements);
        }
        Ok(Statement::new(self, raw))
    }

    /// `true` if `sql` holds anything besides whitespace and comments.
    fn has_statement(&self, sql: &str) -> bool {
        !matches!(self.db.prepare(sql), Ok((None, _)))
    }

    // ── execute (single statement) ──────────────────────────────────────

    /// Prepares and executes a single SQL statement with the given parameters.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// See [`Statement::execute`].
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        self.prepare(sql)?.execute(params)
    }

    /// Prepares and runs a statement, reporting whether it returned a row.
    ///
    /// # Errors
    ///
    /// See [`Statement::exists`].
    pub fn exists<P: Params>(&self, sql: &str, params: P) -> DbResult<bool> {
        self.prepare(sql)?.exists(params)
    }

    // ── query_row ───────────────────────────────────────────────────────

    /// Prepares and executes a statement, mapping the first result row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::QueryReturnedNoRows`] if no row is returned.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> DbResult<T>,
    {
        self.prepare(sql)?.query_row(params, f)
    }

    /// Like [`query_row`](Self::query_row) but returns `Ok(None)` when no row
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns prepare, binding, engine, and mapping errors.
    pub fn query_row_optional<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> DbResult<T>,
    {
        match self.query_row(sql, params, f) {
            Ok(value) => Ok(Some(value)),
            Err(DbError::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Begins a deferred transaction.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already open on this connection.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    /// Begins a transaction with the given locking behavior.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already open or the lock is unavailable.
    pub fn transaction_with_behavior(
        &self,
        behavior: TransactionBehavior,
    ) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, behavior)
    }

    /// Opens a top-level savepoint. Outside a transaction this also starts
    /// one, which ends when the savepoint is released.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint(&self) -> DbResult<Savepoint<'_>> {
        Savepoint::with_depth(self, 0)
    }

    /// Opens a top-level savepoint with an explicit name.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint_with_name(&self, name: impl Into<String>) -> DbResult<Savepoint<'_>> {
        Savepoint::with_name(self, 0, name.into())
    }

    // ── Connection state ────────────────────────────────────────────────

    /// `true` when no explicit transaction is open.
    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.db.is_autocommit()
    }

    /// Returns the rowid of the most recent successful INSERT.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> u64 {
        self.db.changes()
    }

    /// Sets how long the engine retries on a locked database before
    /// returning `SQLITE_BUSY`. Zero turns the retry off.
    ///
    /// # Errors
    ///
    /// Propagates the engine's result code.
    pub fn busy_timeout(&self, timeout: Duration) -> DbResult<()> {
        let millis = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        self.db.busy_timeout(millis)
    }

    /// Returns a handle for interrupting this connection from another thread.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            raw: self.db.interrupt_handle(),
        }
    }

    /// Closes the connection, reporting any failure.
    ///
    /// # Errors
    ///
    /// Propagates the engine's result code.
    pub fn close(mut self) -> DbResult<()> {
        debug!("closing sqlite connection");
        self.db.close()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("autocommit", &self.is_autocommit())
            .finish_non_exhaustive()
    }
}
