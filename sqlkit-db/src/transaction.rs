//! Safe wrapper around a `SQLite` transaction.

use std::ops::Deref;

use log::{debug, warn};

use super::connection::Connection;
use super::error::DbResult;
use super::savepoint::Savepoint;

/// Transaction isolation / locking behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionBehavior {
    /// `BEGIN DEFERRED` (the default).
    #[default]
    Deferred,
    /// `BEGIN IMMEDIATE` – acquires a RESERVED lock immediately.
    Immediate,
    /// `BEGIN EXCLUSIVE` – no other connection may read or write.
    Exclusive,
}

impl TransactionBehavior {
    const fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
            Self::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// What an unfinished [`Transaction`] or [`Savepoint`] does when dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum DropBehavior {
    /// Roll back the changes (the default).
    #[default]
    Rollback,
    /// Commit the changes, rolling back if the commit fails.
    Commit,
    /// Leave the transaction open. The caller must finish it later with
    /// plain SQL.
    Ignore,
    /// Treat the drop as a bug: panic (transactions) or report
    /// [`DbError::UnfinishedSavepoint`](crate::DbError::UnfinishedSavepoint)
    /// (savepoints).
    Panic,
}

/// An open database transaction.
///
/// Rolls back on drop unless committed, or unless another
/// [`DropBehavior`] is set. Derefs to [`Connection`], so every query method
/// is available while the transaction is open.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    drop_behavior: DropBehavior,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    /// Begins a new transaction on `conn`.
    pub(super) fn begin(conn: &'conn Connection, behavior: TransactionBehavior) -> DbResult<Self> {
        conn.execute_batch(behavior.begin_sql())?;
        debug!("transaction started ({behavior:?})");
        Ok(Self {
            conn,
            drop_behavior: DropBehavior::default(),
            finished: false,
        })
    }

    /// What happens if the transaction is dropped unfinished.
    #[must_use]
    pub const fn drop_behavior(&self) -> DropBehavior {
        self.drop_behavior
    }

    /// Changes what happens if the transaction is dropped unfinished.
    pub fn set_drop_behavior(&mut self, drop_behavior: DropBehavior) {
        self.drop_behavior = drop_behavior;
    }

    /// Opens a savepoint inside this transaction.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint(&mut self) -> DbResult<Savepoint<'_>> {
        Savepoint::with_depth(self.conn, 1)
    }

    /// Opens a savepoint with an explicit name inside this transaction.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `SAVEPOINT`.
    pub fn savepoint_with_name(&mut self, name: impl Into<String>) -> DbResult<Savepoint<'_>> {
        Savepoint::with_name(self.conn, 1, name.into())
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `COMMIT`; the transaction is then
    /// rolled back when dropped.
    pub fn commit(mut self) -> DbResult<()> {
        self.commit_()
    }

    fn commit_(&mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        debug!("transaction committed");
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Propagates the engine error from `ROLLBACK`.
    pub fn rollback(mut self) -> DbResult<()> {
        self.rollback_()
    }

    fn rollback_(&mut self) -> DbResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Finishes the transaction the way dropping it would, but reports the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns the engine error from whichever statement the drop behavior
    /// ran.
    pub fn finish(mut self) -> DbResult<()> {
        self.finish_()
    }

    fn finish_(&mut self) -> DbResult<()> {
        // A failed statement can make the engine end the transaction on
        // its own; there is nothing left to finish then.
        if self.finished || self.conn.is_autocommit() {
            self.finished = true;
            return Ok(());
        }
        match self.drop_behavior {
            DropBehavior::Rollback => self.rollback_(),
            DropBehavior::Commit => self.commit_().or_else(|err| {
                warn!("commit on drop failed, rolling back: {err}");
                self.rollback_()
            }),
            DropBehavior::Ignore => {
                self.finished = true;
                Ok(())
            }
            DropBehavior::Panic => {
                if std::thread::panicking() {
                    return self.rollback_();
                }
                self.finished = true;
                panic!("transaction dropped without commit or rollback");
            }
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.finish_() {
            warn!("failed to finish transaction on drop: {err}");
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("drop_behavior", &self.drop_behavior)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
