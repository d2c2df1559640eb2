//! Command implementation.
//!
//! This module provides the command parsing, lookup, and execution layer.

mod connection;
mod executor;
mod keys;
mod lists;
mod registry;
mod strings;

pub use executor::CommandExecutor;
pub use registry::{Command, CommandHandler, CommandRegistry, Routing};

use crate::error::{CommandError, Result};
use crate::protocol::Frame;
use crate::server::ClientState;
use crate::storage::Db;
use bytes::Bytes;

/// Parsed command with name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name (uppercase)
    pub name: String,
    /// Command arguments
    pub args: Vec<Bytes>,
}

impl ParsedCommand {
    /// Split a decoded command line into its name and arguments.
    pub fn from_args(mut line: Vec<Bytes>) -> Result<Self> {
        if line.is_empty() {
            return Err(CommandError::SyntaxError.into());
        }
        let args = line.split_off(1);
        let name = String::from_utf8_lossy(&line[0]).to_uppercase();
        Ok(Self { name, args })
    }

    /// Parse a command from a RESP frame.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        Self::from_args(frame.into_command_args()?)
    }

    /// The full command line, name first, as it goes on the wire.
    pub fn to_args(&self) -> Vec<Bytes> {
        let mut line = Vec::with_capacity(self.args.len() + 1);
        line.push(Bytes::copy_from_slice(self.name.as_bytes()));
        line.extend(self.args.iter().cloned());
        line
    }

    /// Encode the command as an array of bulk strings.
    pub fn to_frame(&self) -> Frame {
        Frame::command(self.to_args())
    }

    /// Get the number of arguments (excluding command name).
    #[inline]
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get an argument as bytes.
    #[inline]
    pub fn get_arg(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index)
    }

    /// Get an argument as a string.
    pub fn get_str(&self, index: usize) -> Result<&str> {
        let bytes = self.args.get(index).ok_or_else(|| self.wrong_arity())?;
        std::str::from_utf8(bytes).map_err(|_| CommandError::SyntaxError.into())
    }

    /// Get an argument as an i64.
    pub fn get_i64(&self, index: usize) -> Result<i64> {
        let bytes = self.args.get(index).ok_or_else(|| self.wrong_arity())?;
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CommandError::NotInteger.into())
    }

    /// Error for a call with the wrong number of arguments.
    pub fn wrong_arity(&self) -> crate::Error {
        CommandError::WrongArity {
            command: self.name.to_lowercase(),
        }
        .into()
    }
}

/// Number of arguments a command takes after its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// At least this many arguments
    AtLeast(usize),
}

impl Arity {
    /// Decode the signed form: `n >= 0` is exact, `-n` means at least `n`.
    #[inline]
    pub const fn from_signed(arity: i32) -> Self {
        if arity >= 0 {
            Self::Exact(arity as usize)
        } else {
            Self::AtLeast(arity.unsigned_abs() as usize)
        }
    }

    /// Check an argument count against this arity.
    #[inline]
    pub const fn accepts(self, argc: usize) -> bool {
        match self {
            Self::Exact(n) => argc == n,
            Self::AtLeast(n) => argc >= n,
        }
    }
}

bitflags::bitflags! {
    /// Command flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CommandFlags: u8 {
        /// Command is read-only
        const READONLY = 1 << 0;
        /// Command modifies data
        const WRITE    = 1 << 1;
        /// Command is for admin use
        const ADMIN    = 1 << 2;
        /// Command uses no keys
        const NO_KEYS  = 1 << 3;
        /// Connection-level command that never touches the keyspace
        const CONNECTION = 1 << 4;
    }
}

impl CommandFlags {
    /// Flags for read-only commands.
    #[inline]
    pub const fn readonly() -> Self {
        Self::READONLY
    }

    /// Flags for write commands.
    #[inline]
    pub const fn write() -> Self {
        Self::WRITE
    }

    /// Flags for admin commands (admin + no_keys).
    #[inline]
    pub const fn admin() -> Self {
        Self::ADMIN.union(Self::NO_KEYS)
    }

    /// Flags for connection commands (connection + no_keys).
    #[inline]
    pub const fn connection() -> Self {
        Self::CONNECTION.union(Self::NO_KEYS)
    }

    /// Check if the command may change the keyspace.
    #[inline]
    pub const fn is_write(self) -> bool {
        self.contains(Self::WRITE)
    }
}

/// Everything a handler may touch while it runs.
#[derive(Debug)]
pub struct CommandContext<'a> {
    /// Keyspace of the client's selected database
    pub db: &'a Db,
    /// The calling connection
    pub client: &'a ClientState,
    /// Number of configured databases
    pub databases: usize,
    persist: bool,
}

impl<'a> CommandContext<'a> {
    /// Create a context for one command invocation.
    pub fn new(db: &'a Db, client: &'a ClientState, databases: usize) -> Self {
        Self {
            db,
            client,
            databases,
            persist: false,
        }
    }

    /// Ask for the running command to be appended to the AOF.
    ///
    /// Only call after the command changed the keyspace.
    #[inline]
    pub fn persist(&mut self) {
        self.persist = true;
    }

    /// Whether the running command asked to be logged.
    #[inline]
    pub fn wants_persist(&self) -> bool {
        self.persist
    }
}

/// Run one handler against a database with a throwaway client.
///
/// Returns the reply and whether the handler asked to be logged.
#[cfg(test)]
pub(crate) fn invoke(handler: CommandHandler, db: &Db, parts: &[&str]) -> (Result<Frame>, bool) {
    let line = parts
        .iter()
        .map(|p| Bytes::copy_from_slice(p.as_bytes()))
        .collect();
    let cmd = ParsedCommand::from_args(line).expect("non-empty command line");
    let client = ClientState::detached();
    let mut ctx = CommandContext::new(db, &client, crate::types::DEFAULT_DATABASES);
    let reply = handler(&cmd, &mut ctx);
    (reply, ctx.wants_persist())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(parts: &[&str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|p| Bytes::copy_from_slice(p.as_bytes()))
            .collect()
    }

    #[test]
    fn test_parse_uppercases_name() {
        let cmd = ParsedCommand::from_args(line(&["sEt", "k", "v"])).unwrap();
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.arg_count(), 2);
        assert_eq!(cmd.to_args(), line(&["SET", "k", "v"]));
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(ParsedCommand::from_args(Vec::new()).is_err());
    }

    #[test]
    fn test_get_i64() {
        let cmd = ParsedCommand::from_args(line(&["LINDEX", "k", "-3", "x"])).unwrap();
        assert_eq!(cmd.get_i64(1).unwrap(), -3);
        assert!(matches!(
            cmd.get_i64(2),
            Err(crate::Error::Command(CommandError::NotInteger))
        ));
        assert!(matches!(
            cmd.get_i64(9),
            Err(crate::Error::Command(CommandError::WrongArity { .. }))
        ));
    }

    #[test]
    fn test_arity() {
        assert_eq!(Arity::from_signed(2), Arity::Exact(2));
        assert_eq!(Arity::from_signed(-1), Arity::AtLeast(1));

        assert!(Arity::Exact(0).accepts(0));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(2).accepts(5));
        assert!(!Arity::AtLeast(2).accepts(1));
    }

    #[test]
    fn test_flags() {
        assert!(CommandFlags::write().is_write());
        assert!(!CommandFlags::readonly().is_write());
        assert!(CommandFlags::admin().contains(CommandFlags::NO_KEYS));
        assert!(CommandFlags::connection().contains(CommandFlags::CONNECTION));
        assert!(!CommandFlags::connection().is_write());
    }
}
