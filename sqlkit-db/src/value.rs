//! Parameter and column value types for the safe `SQLite` wrapper.
//!
//! [`ToValue`] turns a Rust value into a [`ValueRef`] for binding, borrowing
//! text and blob bytes from the source. [`FromValue`] decodes a column back
//! into a Rust type and is strict about the type tag: an `INTEGER` column is
//! never read as `f64`, a `TEXT` column is never parsed as a number, and
//! `NULL` only decodes into `Option<T>` or [`Value`].

use std::fmt;
use std::str::Utf8Error;

use thiserror::Error;

/// Storage class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Text.
    Text,
    /// Binary blob.
    Blob,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        })
    }
}

/// An owned value that can be bound to a prepared statement parameter or
/// read from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the storage class.
    #[must_use]
    pub const fn data_type(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Integer(_) => Type::Integer,
            Self::Real(_) => Type::Real,
            Self::Text(_) => Type::Text,
            Self::Blob(_) => Type::Blob,
        }
    }

    /// Borrows this value as a [`ValueRef`].
    #[must_use]
    pub fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            Self::Null => ValueRef::Null,
            Self::Integer(i) => ValueRef::Integer(*i),
            Self::Real(r) => ValueRef::Real(*r),
            Self::Text(t) => ValueRef::Text(t.as_bytes()),
            Self::Blob(b) => ValueRef::Blob(b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Copies a borrowed value out. Text that is not valid UTF-8 is converted
/// lossily; use [`FromValue`] to reject it instead.
impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

/// A borrowed value.
///
/// When read from a row, the text and blob bytes point into engine-owned
/// memory and the borrow ends before the statement can step, reset, or be
/// finalized. Copy them out (for example with [`FromValue`] into `String`
/// or `Vec<u8>`) to keep them longer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// Text bytes. UTF-8 when written through this crate, but the engine
    /// does not enforce it.
    Text(&'a [u8]),
    /// Binary blob.
    Blob(&'a [u8]),
}

impl ValueRef<'_> {
    /// Returns the storage class.
    #[must_use]
    pub const fn data_type(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Integer(_) => Type::Integer,
            Self::Real(_) => Type::Real,
            Self::Text(_) => Type::Text,
            Self::Blob(_) => Type::Blob,
        }
    }

    fn mismatch(self, expected: Type) -> FromValueError {
        FromValueError::InvalidType {
            expected,
            actual: self.data_type(),
        }
    }
}

/// Marker that always binds as SQL NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

// ── ToValue ─────────────────────────────────────────────────────────────

/// Converts a Rust value into a bindable [`ValueRef`].
///
/// Conversions never fail. `bool` binds as `0`/`1`, `None` as NULL.
pub trait ToValue {
    /// Returns the value to bind, borrowing text and blob bytes from `self`.
    fn to_value(&self) -> ValueRef<'_>;
}

macro_rules! to_value_integer {
    ($($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> ValueRef<'_> {
                ValueRef::Integer(i64::from(*self))
            }
        }
    )*};
}

to_value_integer!(i8, i16, i32, i64, u8, u16, u32, bool);

impl ToValue for f64 {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Real(*self)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Real(f64::from(*self))
    }
}

impl ToValue for str {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Text(self.as_bytes())
    }
}

impl ToValue for String {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Text(self.as_bytes())
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Blob(self)
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Blob(self)
    }
}

impl<const N: usize> ToValue for [u8; N] {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Blob(self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> ValueRef<'_> {
        self.as_ref().map_or(ValueRef::Null, ToValue::to_value)
    }
}

impl ToValue for Null {
    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::Null
    }
}

impl ToValue for Value {
    fn to_value(&self) -> ValueRef<'_> {
        self.as_value_ref()
    }
}

impl ToValue for ValueRef<'_> {
    fn to_value(&self) -> ValueRef<'_> {
        *self
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> ValueRef<'_> {
        (**self).to_value()
    }
}

// ── FromValue ───────────────────────────────────────────────────────────

/// Why a [`ValueRef`] could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FromValueError {
    /// The value's tag is not one the target type accepts.
    #[error("expected {expected}, found {actual}")]
    InvalidType {
        /// Tag the target type accepts.
        expected: Type,
        /// Tag of the value.
        actual: Type,
    },
    /// The integer does not fit the target type.
    #[error("integer {0} out of range")]
    OutOfRange(i64),
    /// The text is not valid UTF-8.
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
}

/// Decodes a Rust value from a [`ValueRef`].
pub trait FromValue: Sized {
    /// Decodes `value`, failing when its tag does not match.
    ///
    /// # Errors
    ///
    /// Returns [`FromValueError`] on a tag mismatch, an out-of-range
    /// integer, or invalid UTF-8.
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError>;
}

impl FromValue for i64 {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        match value {
            ValueRef::Integer(i) => Ok(i),
            other => Err(other.mismatch(Type::Integer)),
        }
    }
}

macro_rules! from_value_integer {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
                let i = i64::from_value(value)?;
                <$t>::try_from(i).map_err(|_| FromValueError::OutOfRange(i))
            }
        }
    )*};
}

from_value_integer!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for bool {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        i64::from_value(value).map(|i| i != 0)
    }
}

impl FromValue for f64 {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        match value {
            ValueRef::Real(r) => Ok(r),
            other => Err(other.mismatch(Type::Real)),
        }
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        f64::from_value(value).map(|r| r as Self)
    }
}

impl FromValue for String {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        match value {
            ValueRef::Text(bytes) => Ok(std::str::from_utf8(bytes)?.to_owned()),
            other => Err(other.mismatch(Type::Text)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        match value {
            ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
            other => Err(other.mismatch(Type::Blob)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        match value {
            ValueRef::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: ValueRef<'_>) -> Result<Self, FromValueError> {
        Ok(match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(bytes) => Self::Text(std::str::from_utf8(bytes)?.to_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ValueRef::Real(1.5), Type::Real ; "real")]
    #[test_case(ValueRef::Text(b"12"), Type::Text ; "numeric text")]
    #[test_case(ValueRef::Null, Type::Null ; "null")]
    #[test_case(ValueRef::Blob(&[1]), Type::Blob ; "blob")]
    fn integer_rejects_other_tags(value: ValueRef<'_>, actual: Type) {
        assert_eq!(
            i64::from_value(value),
            Err(FromValueError::InvalidType {
                expected: Type::Integer,
                actual,
            })
        );
    }

    #[test]
    fn real_does_not_accept_integer() {
        assert!(matches!(
            f64::from_value(ValueRef::Integer(3)),
            Err(FromValueError::InvalidType { expected: Type::Real, actual: Type::Integer })
        ));
    }

    #[test]
    fn narrowing_reports_out_of_range() {
        assert_eq!(u8::from_value(ValueRef::Integer(256)), Err(FromValueError::OutOfRange(256)));
        assert_eq!(u64::from_value(ValueRef::Integer(-1)), Err(FromValueError::OutOfRange(-1)));
        assert_eq!(i32::from_value(ValueRef::Integer(-7)), Ok(-7));
    }

    #[test]
    fn null_only_decodes_into_option() {
        assert_eq!(Option::<String>::from_value(ValueRef::Null), Ok(None));
        assert_eq!(Option::<i64>::from_value(ValueRef::Integer(4)), Ok(Some(4)));
        assert!(String::from_value(ValueRef::Null).is_err());
    }

    #[test]
    fn bool_binds_as_integer() {
        assert_eq!(true.to_value(), ValueRef::Integer(1));
        assert_eq!(false.to_value(), ValueRef::Integer(0));
        assert_eq!(bool::from_value(ValueRef::Integer(7)), Ok(true));
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let bytes = [0xff, 0xfe];
        assert!(matches!(
            String::from_value(ValueRef::Text(&bytes)),
            Err(FromValueError::Utf8(_))
        ));
        assert!(matches!(
            Value::from_value(ValueRef::Text(&bytes)),
            Err(FromValueError::Utf8(_))
        ));
    }

    #[test]
    fn option_and_references_delegate() {
        let name = String::from("ada");
        assert_eq!(Some(&name).to_value(), ValueRef::Text(b"ada"));
        assert_eq!(None::<i64>.to_value(), ValueRef::Null);
        assert_eq!((&&5_i32).to_value(), ValueRef::Integer(5));
        assert_eq!(Null.to_value(), ValueRef::Null);
    }
}
