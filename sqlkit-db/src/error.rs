//! Database error types for the safe `SQLite` wrapper.

use std::fmt;
use std::str::Utf8Error;

use thiserror::Error;

use crate::value::Type;

/// Result code returned by `SQLite` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// Returns the primary result code, stripping any extended bits.
    #[must_use]
    pub const fn primary(self) -> i32 {
        self.0 & 0xff
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    /// The engine returned a non-OK result code.
    #[error("sqlite error {code}: {message}")]
    Engine {
        /// `SQLite` result code.
        code: ErrorCode,
        /// Message from `sqlite3_errmsg`, or the generic text for `code`.
        message: String,
    },

    /// A column index past the end of the result row was requested.
    #[error("invalid column index {0}")]
    InvalidColumnIndex(usize),

    /// No result column has the requested name.
    #[error("invalid column name {0:?}")]
    InvalidColumnName(String),

    /// The column's type tag does not match the requested Rust type.
    #[error("column {index} holds {actual}, which cannot be read as {expected}")]
    InvalidColumnType {
        /// Column index (0-based).
        index: usize,
        /// Tag the target type accepts.
        expected: Type,
        /// Tag actually stored in the column.
        actual: Type,
    },

    /// An integer column does not fit the requested integer type.
    #[error("column {index} holds {value}, which is out of range for the requested type")]
    IntegralValueOutOfRange {
        /// Column index (0-based).
        index: usize,
        /// Stored value.
        value: i64,
    },

    /// A text column is not valid UTF-8.
    #[error("column {index} is not valid UTF-8: {source}")]
    Utf8 {
        /// Column index (0-based).
        index: usize,
        /// Decoding failure.
        source: Utf8Error,
    },

    /// `prepare` was given more than one statement.
    #[error("multiple statements provided; prepare accepts exactly one")]
    MultipleStatements,

    /// `prepare` was given only whitespace and comments.
    #[error("SQL text contains no statement")]
    EmptyStatement,

    /// SQL text contains an interior NUL byte.
    #[error("SQL text contains an interior NUL byte")]
    NulInSql,

    /// A statement run for its side effects produced a result row.
    #[error("execute returned results; use a query method for row-producing statements")]
    ExecuteReturnedResults,

    /// A single-row query produced no rows.
    #[error("query returned no rows")]
    QueryReturnedNoRows,

    /// A named parameter does not appear in the statement.
    #[error("parameter {0:?} not found in statement")]
    ParameterNotFound(String),

    /// A single-row write affected some other number of rows.
    #[error("statement affected {0} rows, expected exactly 1")]
    WrongRowCount(usize),

    /// A savepoint with [`DropBehavior::Panic`](crate::DropBehavior::Panic)
    /// was finished without being committed.
    #[error("savepoint {0:?} finished without commit or rollback")]
    UnfinishedSavepoint(String),
}

impl DbError {
    /// Creates an engine error.
    pub(crate) fn engine(code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            code: ErrorCode(code),
            message: message.into(),
        }
    }

    /// Returns the engine result code, if this is an engine error.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
