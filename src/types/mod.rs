//! Core value types.

mod key;
mod list;
mod value;

pub use key::Key;
pub use list::ValueList;
pub use value::Value;

/// Database index type.
pub type DbIndex = usize;

/// Default number of logical databases.
pub const DEFAULT_DATABASES: usize = 16;

/// The type of a stored value, as reported by TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// String type
    String,
    /// List type
    List,
}

impl ValueType {
    /// Returns the type name as used in the TYPE command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
