//! Nested savepoints.

use std::ops::Deref;

use log::{debug, warn};

use super::connection::Connection;
use super::error::{DbError, DbResult};
use super::transaction::DropBehavior;

/// An active savepoint.
///
/// Unlike a [`Transaction`](crate::Transaction), a savepoint survives
/// [`rollback`](Self::rollback): it stays active until it is committed
/// (`RELEASE`) or dropped. Savepoints nest; each one borrows its parent
/// mutably, so only the innermost can be used at a time.
pub struct Savepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    depth: u32,
    drop_behavior: DropBehavior,
    finished: bool,
}

impl<'conn> Savepoint<'conn> {
    /// Opens a savepoint named after its nesting depth.
    pub(super) fn with_depth(conn: &'conn Connection, depth: u32) -> DbResult<Self> {
        Self::with_name(conn, depth, format!("_sqlkit_sp_{depth}"))
    }

    /// Opens a savepoint called `name`.
    pub(super) fn with_name(conn: &'conn Connection, depth: u32, name: String) -> DbResult<Self> {
        conn.execute_batch(&format!("SAVEPOINT {}", quote(&name)))?;
        debug!("savepoint {name} started at depth {depth}");
        Ok(Self {
            conn,
            name,
            depth,
            drop_behavior: DropBehavior::default(),
            finished: false,
        })
    }

    /// Name the savepoint was created with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nesting depth (0 for a savepoint opened directly on a connection).
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// What happens if the savepoint is dropped unfinished.
    #[must_use]
    pub const fn drop_behavior(&self) -> DropBehavior {
        self.drop_behavior
    }

    /// Changes what happens if the savepoint is dropped unfinished.
    pub fn set_drop_behavior(&mut self, drop_behavior: DropBehavior) {
        self.drop_behavior = drop_behavior;
    }

    /// Opens a savepoint nested inside this one.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint(&mut self) -> DbResult<Savepoint<'_>> {
        Savepoint::with_depth(self.conn, self.depth + 1)
    }

    /// Opens a nested savepoint with an explicit name.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint_with_name(&mut self, name: impl Into<String>) -> DbResult<Savepoint<'_>> {
        Savepoint::with_name(self.conn, self.depth + 1, name.into())
    }

    /// Releases the savepoint, keeping its changes as part of the enclosing
    /// transaction (or committing them if there is none).
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `RELEASE`.
    pub fn commit(mut self) -> DbResult<()> {
        self.commit_()
    }

    fn commit_(&mut self) -> DbResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE {}", quote(&self.name)))?;
        self.finished = true;
        debug!("savepoint {} released", self.name);
        Ok(())
    }

    /// Undoes every change made since the savepoint was opened.
    ///
    /// The savepoint stays active: further changes may be made and then
    /// committed or rolled back again.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `ROLLBACK TO`.
    pub fn rollback(&mut self) -> DbResult<()> {
        self.conn
            .execute_batch(&format!("ROLLBACK TO {}", quote(&self.name)))?;
        debug!("savepoint {} rolled back", self.name);
        Ok(())
    }

    /// Finishes the savepoint the way dropping it would, but reports the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnfinishedSavepoint`] under
    /// [`DropBehavior::Panic`], or the engine error from whichever statement
    /// the drop behavior ran.
    pub fn finish(mut self) -> DbResult<()> {
        self.finish_()
    }

    fn finish_(&mut self) -> DbResult<()> {
        if self.finished || self.conn.is_autocommit() {
            self.finished = true;
            return Ok(());
        }
        match self.drop_behavior {
            DropBehavior::Rollback => {
                self.rollback()?;
                self.commit_()
            }
            DropBehavior::Commit => self.commit_().or_else(|err| {
                warn!("release of savepoint {} failed, rolling back: {err}", self.name);
                self.rollback()?;
                self.commit_()
            }),
            DropBehavior::Ignore => {
                self.finished = true;
                Ok(())
            }
            DropBehavior::Panic => {
                if std::thread::panicking() {
                    self.rollback()?;
                    return self.commit_();
                }
                self.finished = true;
                Err(DbError::UnfinishedSavepoint(self.name.clone()))
            }
        }
    }
}

impl Deref for Savepoint<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        match self.finish_() {
            Ok(()) => {}
            Err(err @ DbError::UnfinishedSavepoint(_)) => panic!("{err}"),
            Err(err) => warn!("failed to finish savepoint {} on drop: {err}", self.name),
        }
    }
}

impl std::fmt::Debug for Savepoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Savepoint")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("drop_behavior", &self.drop_behavior)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Quotes a savepoint name as an SQL identifier.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::quote;

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote("sp"), "\"sp\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
