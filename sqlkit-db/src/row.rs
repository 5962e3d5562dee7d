//! Result rows and lazy row cursors.

use super::error::{DbError, DbResult};
use super::statement::{Statement, StepResult};
use super::value::{FromValue, FromValueError, Type, ValueRef};

/// A column address: a 0-based index or a column name.
pub trait RowIndex {
    /// Resolves the 0-based column index within `stmt`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnIndex`] or
    /// [`DbError::InvalidColumnName`].
    fn row_index(&self, stmt: &Statement<'_>) -> DbResult<usize>;
}

impl RowIndex for usize {
    fn row_index(&self, stmt: &Statement<'_>) -> DbResult<usize> {
        if *self < stmt.column_count() {
            Ok(*self)
        } else {
            Err(DbError::InvalidColumnIndex(*self))
        }
    }
}

impl RowIndex for &str {
    fn row_index(&self, stmt: &Statement<'_>) -> DbResult<usize> {
        stmt.column_index(self)
    }
}

/// The row a statement's cursor currently points at.
///
/// A `Row` holds no data of its own; every accessor reads through the
/// statement. It borrows the statement, so it cannot outlive the next
/// step or reset.
#[derive(Debug, Clone, Copy)]
pub struct Row<'stmt> {
    stmt: &'stmt Statement<'stmt>,
}

impl<'stmt> Row<'stmt> {
    pub(crate) const fn new(stmt: &'stmt Statement<'stmt>) -> Self {
        Self { stmt }
    }

    /// Number of columns in the row.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.stmt.column_count()
    }

    /// Decodes column `idx` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnType`] when the column's tag does not
    /// match `T`, plus index, range, and UTF-8 errors.
    pub fn get<T: FromValue, I: RowIndex>(&self, idx: I) -> DbResult<T> {
        let idx = idx.row_index(self.stmt)?;
        let value = self.stmt.value_ref(idx)?;
        T::from_value(value).map_err(|err| column_error(idx, err))
    }

    /// Borrows column `idx` without decoding it.
    ///
    /// # Errors
    ///
    /// Returns index errors.
    pub fn get_ref<I: RowIndex>(&self, idx: I) -> DbResult<ValueRef<'stmt>> {
        let idx = idx.row_index(self.stmt)?;
        self.stmt.value_ref(idx)
    }

    /// Borrows a `TEXT` column as `&str` without copying.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnType`] for other tags and
    /// [`DbError::Utf8`] for invalid text.
    pub fn get_string_slice<I: RowIndex>(&self, idx: I) -> DbResult<&'stmt str> {
        let idx = idx.row_index(self.stmt)?;
        match self.stmt.value_ref(idx)? {
            ValueRef::Text(bytes) => {
                std::str::from_utf8(bytes).map_err(|source| DbError::Utf8 { index: idx, source })
            }
            other => Err(DbError::InvalidColumnType {
                index: idx,
                expected: Type::Text,
                actual: other.data_type(),
            }),
        }
    }

    /// Borrows a `BLOB` column without copying.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumnType`] for other tags.
    pub fn get_blob_slice<I: RowIndex>(&self, idx: I) -> DbResult<&'stmt [u8]> {
        let idx = idx.row_index(self.stmt)?;
        match self.stmt.value_ref(idx)? {
            ValueRef::Blob(bytes) => Ok(bytes),
            other => Err(DbError::InvalidColumnType {
                index: idx,
                expected: Type::Blob,
                actual: other.data_type(),
            }),
        }
    }

    /// Reads an `INTEGER` column.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_int64<I: RowIndex>(&self, idx: I) -> DbResult<i64> {
        self.get(idx)
    }

    /// Reads a `REAL` column.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_float64<I: RowIndex>(&self, idx: I) -> DbResult<f64> {
        self.get(idx)
    }

    /// Reads an `INTEGER` column as a boolean (nonzero is `true`).
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_bool<I: RowIndex>(&self, idx: I) -> DbResult<bool> {
        self.get(idx)
    }
}

fn column_error(index: usize, err: FromValueError) -> DbError {
    match err {
        FromValueError::InvalidType { expected, actual } => DbError::InvalidColumnType {
            index,
            expected,
            actual,
        },
        FromValueError::OutOfRange(value) => DbError::IntegralValueOutOfRange { index, value },
        FromValueError::Utf8(source) => DbError::Utf8 { index, source },
    }
}

/// Lazy cursor over a query's rows.
///
/// Each [`next`](Self::next) steps the statement once. When the rows run out,
/// or the cursor is dropped early, the statement is reset so it can run
/// again straight away.
pub struct Rows<'stmt, 'conn> {
    stmt: &'stmt mut Statement<'conn>,
    done: bool,
}

impl<'stmt, 'conn> Rows<'stmt, 'conn> {
    pub(crate) fn new(stmt: &'stmt mut Statement<'conn>) -> Self {
        Self { stmt, done: false }
    }

    /// Steps to the next row. Returns `Ok(None)` once the rows run out.
    ///
    /// # Errors
    ///
    /// Returns the engine error from the step; the cursor then reports no
    /// further rows.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> DbResult<Option<Row<'_>>> {
        if self.done {
            return Ok(None);
        }
        match self.stmt.step() {
            Ok(StepResult::Row) => Ok(Some(Row::new(&*self.stmt))),
            Ok(StepResult::Done) => {
                self.done = true;
                self.stmt.reset_quietly();
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    /// Turns the cursor into an iterator that maps each row through `f`.
    pub fn map<T, F>(self, f: F) -> MappedRows<'stmt, 'conn, F>
    where
        F: FnMut(&Row<'_>) -> DbResult<T>,
    {
        MappedRows { rows: self, map: f }
    }
}

impl Drop for Rows<'_, '_> {
    fn drop(&mut self) {
        self.stmt.reset_quietly();
    }
}

/// Iterator returned by [`Statement::query_map`].
pub struct MappedRows<'stmt, 'conn, F> {
    rows: Rows<'stmt, 'conn>,
    map: F,
}

impl<T, F> Iterator for MappedRows<'_, '_, F>
where
    F: FnMut(&Row<'_>) -> DbResult<T>,
{
    type Item = DbResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let map = &mut self.map;
        match self.rows.next() {
            Ok(Some(row)) => Some(map(&row)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
