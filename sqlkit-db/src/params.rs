//! Parameter sets and parameter addressing.

use crate::error::{DbError, DbResult};
use crate::statement::Statement;
use crate::value::{ToValue, Value};

/// A placeholder address: a 1-based position or a placeholder name
/// including its sigil (`:name`, `@name`, `$name`).
pub trait ParamIndex {
    /// Resolves the 1-based parameter index within `stmt`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ParameterNotFound`] for unknown names.
    fn param_index(&self, stmt: &Statement<'_>) -> DbResult<usize>;
}

impl ParamIndex for usize {
    fn param_index(&self, _stmt: &Statement<'_>) -> DbResult<usize> {
        Ok(*self)
    }
}

impl ParamIndex for &str {
    fn param_index(&self, stmt: &Statement<'_>) -> DbResult<usize> {
        stmt.parameter_index(self)
            .ok_or_else(|| DbError::ParameterNotFound((*self).to_string()))
    }
}

/// A complete set of parameters for one execution of a statement.
///
/// Positional and named slices start from a clean slate: every parameter is
/// reset to NULL before the set is bound, so a placeholder the set does not
/// mention reads as NULL even if an earlier execution bound it. `()` binds
/// nothing and keeps values set with [`Statement::bind`].
pub trait Params {
    /// Binds this set to `stmt`.
    ///
    /// # Errors
    ///
    /// Propagates binding failures from the engine and unknown names.
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()>;
}

impl Params for () {
    fn bind_to(self, _stmt: &mut Statement<'_>) -> DbResult<()> {
        Ok(())
    }
}

impl Params for &[&dyn ToValue] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()> {
        stmt.clear_bindings()?;
        for (i, value) in self.iter().enumerate() {
            stmt.bind(i + 1, *value)?;
        }
        Ok(())
    }
}

impl<const N: usize> Params for [&dyn ToValue; N] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl Params for &[(&str, &dyn ToValue)] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()> {
        stmt.clear_bindings()?;
        for (name, value) in self {
            stmt.bind(*name, *value)?;
        }
        Ok(())
    }
}

impl<const N: usize> Params for [(&str, &dyn ToValue); N] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl Params for &[Value] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> DbResult<()> {
        stmt.clear_bindings()?;
        for (i, value) in self.iter().enumerate() {
            stmt.bind(i + 1, value)?;
        }
        Ok(())
    }
}

/// Builds a positional parameter set.
///
/// Usage: `params![1_i64, blob.as_slice(), "text"]`. The set borrows its
/// arguments, so pass it straight to the call that uses it.
#[macro_export]
macro_rules! params {
    () => {
        &[] as &[&dyn $crate::ToValue]
    };
    ($($value:expr),+ $(,)?) => {
        &[$(&$value as &dyn $crate::ToValue),+] as &[&dyn $crate::ToValue]
    };
}

/// Builds a named parameter set.
///
/// Usage: `named_params! { ":id": 7, "@name": "ada" }`.
#[macro_export]
macro_rules! named_params {
    () => {
        &[] as &[(&str, &dyn $crate::ToValue)]
    };
    ($($name:literal : $value:expr),+ $(,)?) => {
        &[$(($name, &$value as &dyn $crate::ToValue)),+] as &[(&str, &dyn $crate::ToValue)]
    };
}
