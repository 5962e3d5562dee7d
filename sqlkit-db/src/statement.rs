//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use std::ffi::c_int;

use log::trace;

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::ffi::{self, RawStmt};
use super::params::{ParamIndex, Params};
use super::row::{MappedRows, Row, Rows};
use super::value::{ToValue, ValueRef};

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// Where a statement is in its execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Prepared or reset; no current row.
    Ready,
    /// A row is available through [`Statement::row`].
    HasRow,
    /// Execution ran to completion.
    Done,
    /// The handle has been released.
    Finalized,
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare).
/// Tied to the lifetime of the connection that created it.
/// Finalized when dropped, or explicitly with [`finalize`](Self::finalize).
pub struct Statement<'conn> {
    conn: &'conn Connection,
    raw: RawStmt<'conn>,
    column_count: usize,
    parameter_count: usize,
    state: StatementState,
}

impl<'conn> Statement<'conn> {
    /// Wraps a raw statement handle.
    pub(super) fn new(conn: &'conn Connection, raw: RawStmt<'conn>) -> Self {
        let column_count = usize::try_from(raw.column_count()).unwrap_or(0);
        let parameter_count = usize::try_from(raw.parameter_count()).unwrap_or(0);
        Self {
            conn,
            raw,
            column_count,
            parameter_count,
            state: StatementState::Ready,
        }
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Number of columns in the result set (0 for statements without one).
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.column_count
    }

    /// Number of parameter slots (the largest parameter index).
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Current execution state.
    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    /// Name of the result column at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnIndex`] when `idx` is out of range.
    pub fn column_name(&self, idx: usize) -> DbResult<&str> {
        if idx >= self.column_count {
            return Err(DbError::InvalidColumnIndex(idx));
        }
        let col = c_int::try_from(idx).map_err(|_| DbError::InvalidColumnIndex(idx))?;
        self.raw
            .column_name(col)
            .ok_or(DbError::InvalidColumnIndex(idx))
    }

    /// Names of all result columns, in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        (0..self.column_count)
            .filter_map(|idx| self.column_name(idx).ok())
            .collect()
    }

    /// Index of the result column called `name` (ASCII case-insensitive,
    /// as the engine matches identifiers).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnName`] when no column matches.
    pub fn column_index(&self, name: &str) -> DbResult<usize> {
        (0..self.column_count)
            .find(|&idx| {
                self.column_name(idx)
                    .is_ok_and(|col| col.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| DbError::InvalidColumnName(name.to_string()))
    }

    /// 1-based index of the named parameter, including its sigil.
    #[must_use]
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        match self.raw.parameter_index(name) {
            0 => None,
            idx => usize::try_from(idx).ok(),
        }
    }

    /// Name of the parameter at 1-based `idx`; `None` for `?` placeholders.
    #[must_use]
    pub fn parameter_name(&self, idx: usize) -> Option<&str> {
        c_int::try_from(idx)
            .ok()
            .and_then(|idx| self.raw.parameter_name(idx))
    }

    /// `true` if the statement makes no direct changes to the database.
    #[must_use]
    pub fn readonly(&self) -> bool {
        self.raw.readonly()
    }

    /// SQL text the statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.raw.sql()
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Binds `value` at a 1-based position or a named placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ParameterNotFound`] for unknown names and an
    /// engine range error for positions outside `1..=parameter_count`.
    pub fn bind<I, V>(&mut self, index: I, value: &V) -> DbResult<()>
    where
        I: ParamIndex,
        V: ToValue + ?Sized,
    {
        let index = index.param_index(self)?;
        let idx = c_int::try_from(index).map_err(|_| {
            DbError::engine(ffi::SQLITE_RANGE, format!("parameter index {index} out of range"))
        })?;
        match value.to_value() {
            ValueRef::Null => self.raw.bind_null(idx),
            ValueRef::Integer(v) => self.raw.bind_int64(idx, v),
            ValueRef::Real(v) => self.raw.bind_double(idx, v),
            ValueRef::Text(v) => self.raw.bind_text(idx, v),
            ValueRef::Blob(v) => self.raw.bind_blob(idx, v),
        }
    }

    /// Sets every parameter back to NULL.
    ///
    /// # Errors
    ///
    /// Propagates the engine's result code.
    pub fn clear_bindings(&mut self) -> DbResult<()> {
        self.raw.clear_bindings()
    }

    /// Resets the cursor and binds a full parameter set.
    fn bind_params<P: Params>(&mut self, params: P) -> DbResult<()> {
        self.reset_quietly();
        params.bind_to(self)
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Advances the cursor once.
    ///
    /// On failure the statement is reset so it can be run again.
    ///
    /// # Errors
    ///
    /// Returns the engine error for any result other than a row or done.
    pub fn step(&mut self) -> DbResult<StepResult> {
        match self.raw.step() {
            Ok(true) => {
                self.state = StatementState::HasRow;
                Ok(StepResult::Row)
            }
            Ok(false) => {
                self.state = StatementState::Done;
                Ok(StepResult::Done)
            }
            Err(err) => {
                // Reset reports the same failure again; it was captured above.
                self.reset_quietly();
                Err(err)
            }
        }
    }

    /// The current row, if the last step produced one.
    #[must_use]
    pub fn row(&self) -> Option<Row<'_>> {
        (self.state == StatementState::HasRow).then(|| Row::new(self))
    }

    /// Returns the cursor to [`StatementState::Ready`]. Bindings are kept.
    ///
    /// # Errors
    ///
    /// Propagates the engine's result code.
    pub fn reset(&mut self) -> DbResult<()> {
        self.state = StatementState::Ready;
        self.raw.reset()
    }

    /// Resets and discards the engine's echo of an earlier step failure.
    pub(crate) fn reset_quietly(&mut self) {
        let _ = self.reset();
    }

    // ── One-shot execution ──────────────────────────────────────────────

    /// Runs a statement that produces no rows and returns the number of
    /// rows it changed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ExecuteReturnedResults`] if the statement yields a
    /// row, or any binding or engine error.
    pub fn execute<P: Params>(&mut self, params: P) -> DbResult<usize> {
        self.bind_params(params)?;
        match self.step()? {
            StepResult::Row => {
                self.reset_quietly();
                Err(DbError::ExecuteReturnedResults)
            }
            StepResult::Done => {
                let changes = usize::try_from(self.conn.changes()).unwrap_or(usize::MAX);
                self.reset_quietly();
                Ok(changes)
            }
        }
    }

    /// Runs a single-row `INSERT` and returns the new rowid.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::WrongRowCount`] unless exactly one row changed,
    /// plus everything [`execute`](Self::execute) can return.
    pub fn insert<P: Params>(&mut self, params: P) -> DbResult<i64> {
        match self.execute(params)? {
            1 => Ok(self.conn.last_insert_rowid()),
            n => Err(DbError::WrongRowCount(n)),
        }
    }

    /// Steps once and reports whether a row came back.
    ///
    /// # Errors
    ///
    /// Returns any binding or engine error.
    pub fn exists<P: Params>(&mut self, params: P) -> DbResult<bool> {
        self.bind_params(params)?;
        let found = self.step()? == StepResult::Row;
        self.reset_quietly();
        Ok(found)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Binds `params` and returns a lazy cursor over the result rows.
    ///
    /// # Errors
    ///
    /// Returns any binding error.
    pub fn query<P: Params>(&mut self, params: P) -> DbResult<Rows<'_, 'conn>> {
        self.bind_params(params)?;
        Ok(Rows::new(self))
    }

    /// Runs the query and maps the first row through `f`.
    ///
    /// Rows after the first are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::QueryReturnedNoRows`] for an empty result, or
    /// whatever `f` or the engine returns.
    pub fn query_row<T, P, F>(&mut self, params: P, f: F) -> DbResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> DbResult<T>,
    {
        let mut rows = self.query(params)?;
        let first = rows.next()?;
        match first {
            Some(row) => f(&row),
            None => Err(DbError::QueryReturnedNoRows),
        }
    }

    /// Binds `params` and returns an iterator mapping each row through `f`.
    ///
    /// # Errors
    ///
    /// Returns any binding error; row errors surface from the iterator.
    pub fn query_map<T, P, F>(&mut self, params: P, f: F) -> DbResult<MappedRows<'_, 'conn, F>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> DbResult<T>,
    {
        self.query(params).map(|rows| rows.map(f))
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Reads column `idx` of the current row without copying.
    pub(crate) fn value_ref(&self, idx: usize) -> DbResult<ValueRef<'_>> {
        if idx >= self.column_count {
            return Err(DbError::InvalidColumnIndex(idx));
        }
        let col = c_int::try_from(idx).map_err(|_| DbError::InvalidColumnIndex(idx))?;
        Ok(match self.raw.column_type(col) {
            ffi::SQLITE_INTEGER => ValueRef::Integer(self.raw.column_int64(col)),
            ffi::SQLITE_FLOAT => ValueRef::Real(self.raw.column_double(col)),
            ffi::SQLITE_TEXT => ValueRef::Text(self.raw.column_text(col)),
            ffi::SQLITE_BLOB => ValueRef::Blob(self.raw.column_blob(col)),
            _ => ValueRef::Null,
        })
    }

    // ── Finalization ────────────────────────────────────────────────────

    /// Releases the statement handle.
    ///
    /// Taking `self` makes a second finalize impossible; dropping the
    /// statement does the same thing without reporting the result code.
    ///
    /// # Errors
    ///
    /// Propagates the engine's result code.
    pub fn finalize(mut self) -> DbResult<()> {
        self.state = StatementState::Finalized;
        trace!("finalizing statement: {:?}", self.raw.sql());
        self.raw.finalize()
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.raw.sql())
            .field("state", &self.state)
            .field("column_count", &self.column_count)
            .field("parameter_count", &self.parameter_count)
            .finish()
    }
}
