//! Typed, safe wrapper over `SQLite`'s prepared-statement API.
//!
//! The engine itself comes from `libsqlite3-sys` with the bundled
//! amalgamation. On top of it this crate provides:
//!
//! * [`Value`] / [`ValueRef`] and the [`ToValue`] / [`FromValue`] traits,
//!   which move native Rust values in and out of SQL without implicit
//!   coercion.
//! * [`Statement`], a prepared statement with an explicit
//!   [`StatementState`], lazy [`Rows`], and one-shot helpers (`execute`,
//!   `insert`, `exists`, `query_row`, `query_map`).
//! * [`Connection::execute_batch`] and [`Batch`] for multi-statement SQL.
//! * [`Transaction`] and nested [`Savepoint`]s with a configurable
//!   [`DropBehavior`].
//!
//! ```
//! use sqlkit_db::{params, Connection, DbResult};
//!
//! # fn main() -> DbResult<()> {
//! let conn = Connection::open_in_memory()?;
//! conn.execute_batch("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")?;
//!
//! let tx = conn.transaction()?;
//! let id = tx.prepare("INSERT INTO item (name) VALUES (?1)")?.insert(params!["widget"])?;
//! tx.commit()?;
//!
//! let name: String = conn.query_row("SELECT name FROM item WHERE id = ?1", params![id], |row| {
//!     row.get(0)
//! })?;
//! assert_eq!(name, "widget");
//! # Ok(())
//! # }
//! ```
//!
//! The `ffi` module is the **only** file that contains `unsafe` code or C
//! types.

mod ffi;

mod batch;
pub mod config;
mod connection;
pub mod error;
mod params;
mod row;
mod savepoint;
mod statement;
mod transaction;
pub mod value;

pub use batch::Batch;
pub use config::ConnectionConfig;
pub use connection::{Connection, InterruptHandle, OpenFlags};
pub use error::{DbError, DbResult, ErrorCode};
pub use params::{ParamIndex, Params};
pub use row::{MappedRows, Row, RowIndex, Rows};
pub use savepoint::Savepoint;
pub use statement::{Statement, StatementState, StepResult};
pub use transaction::{DropBehavior, Transaction, TransactionBehavior};
pub use value::{FromValue, FromValueError, Null, ToValue, Type, Value, ValueRef};

#[cfg(test)]
mod tests;
