//! Stored value type.

use super::{ValueList, ValueType};
use crate::error::CommandError;
use bytes::Bytes;

/// A value held under a key.
///
/// The set of variants is closed. Callers ask for the variant they need and
/// get [`CommandError::WrongType`] back when the key holds something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// String value (binary-safe bytes)
    String(Bytes),

    /// List value
    List(ValueList),
}

impl Value {
    /// Create a new string value.
    #[inline]
    pub fn string(data: impl Into<Bytes>) -> Self {
        Self::String(data.into())
    }

    /// Create a new empty list.
    #[inline]
    pub fn new_list() -> Self {
        Self::List(ValueList::new())
    }

    /// Returns the type of this value.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::List(_) => ValueType::List,
        }
    }

    /// Borrow as a string.
    pub fn as_string(&self) -> Result<&Bytes, CommandError> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(CommandError::WrongType),
        }
    }

    /// Borrow as a list.
    pub fn as_list(&self) -> Result<&ValueList, CommandError> {
        match self {
            Self::List(l) => Ok(l),
            _ => Err(CommandError::WrongType),
        }
    }

    /// Mutably borrow as a list.
    pub fn as_list_mut(&mut self) -> Result<&mut ValueList, CommandError> {
        match self {
            Self::List(l) => Ok(l),
            _ => Err(CommandError::WrongType),
        }
    }

    /// Returns true for a list with no elements left.
    #[inline]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(l) if l.is_empty())
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::String(b)
    }
}
