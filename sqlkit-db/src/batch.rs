//! Splitting one SQL string into its statements.

use log::trace;

use super::connection::Connection;
use super::error::DbResult;
use super::statement::Statement;

/// Iterator over the statements in a multi-statement SQL string.
///
/// Keeps an explicit byte cursor into the borrowed text. Each call prepares
/// the next statement starting at the cursor and moves the cursor past
/// whatever the engine consumed. Stretches that hold only whitespace or
/// comments are skipped. Iteration stops after the first error.
pub struct Batch<'conn, 'sql> {
    conn: &'conn Connection,
    sql: &'sql str,
    cursor: usize,
}

impl<'conn, 'sql> Batch<'conn, 'sql> {
    /// Creates a batch over `sql`.
    #[must_use]
    pub const fn new(conn: &'conn Connection, sql: &'sql str) -> Self {
        Self { conn, sql, cursor: 0 }
    }

    /// The part of the SQL text not prepared yet.
    #[must_use]
    pub fn remaining(&self) -> &'sql str {
        self.sql.get(self.cursor..).unwrap_or_default()
    }

    fn next_statement(&mut self) -> DbResult<Option<Statement<'conn>>> {
        while self.cursor < self.sql.len() {
            let remaining = self.remaining();
            let (raw, consumed) = self.conn.raw().prepare(remaining)?;
            if consumed == 0 {
                // Nothing left the engine can tokenize.
                self.cursor = self.sql.len();
            } else {
                self.cursor += consumed;
            }
            if let Some(raw) = raw {
                trace!(
                    "batch statement: {}",
                    remaining.get(..consumed).unwrap_or(remaining).trim()
                );
                return Ok(Some(Statement::new(self.conn, raw)));
            }
        }
        Ok(None)
    }
}

impl<'conn> Iterator for Batch<'conn, '_> {
    type Item = DbResult<Statement<'conn>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_statement() {
            Ok(stmt) => stmt.map(Ok),
            Err(err) => {
                self.cursor = self.sql.len();
                Some(Err(err))
            }
        }
    }
}
