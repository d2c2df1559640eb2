//! Command registry for looking up commands by name.
//!
//! The registry is built once at startup and handed to the executor; nothing
//! registers itself implicitly.

use super::{connection, keys, lists, strings};
use super::{Arity, CommandContext, CommandFlags, ParsedCommand};
use crate::Result;
use crate::protocol::Frame;
use std::collections::HashMap;

/// Type alias for a command handler.
///
/// Handlers run synchronously against the client's selected database and
/// return exactly one reply.
pub type CommandHandler = fn(&ParsedCommand, &mut CommandContext<'_>) -> Result<Frame>;

/// Where a command runs when the node is part of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Always runs on the receiving node
    Local,
    /// Runs on the owner of the first argument
    FirstKey,
    /// Runs on the owner of the first two arguments, which must agree
    SameNode,
    /// Runs on every node; replies are aggregated
    Broadcast,
}

/// Command definition.
#[derive(Clone)]
pub struct Command {
    /// Command name
    pub name: &'static str,
    /// Accepted argument count
    pub arity: Arity,
    /// Command flags
    pub flags: CommandFlags,
    /// Cluster placement
    pub routing: Routing,
    /// Handler function
    pub handler: CommandHandler,
    /// Help text
    pub summary: &'static str,
}

impl Command {
    /// Create a new command definition.
    ///
    /// `arity` counts arguments after the name; a negative value is a
    /// minimum.
    pub const fn new(
        name: &'static str,
        arity: i32,
        flags: CommandFlags,
        routing: Routing,
        handler: CommandHandler,
        summary: &'static str,
    ) -> Self {
        Self {
            name,
            arity: Arity::from_signed(arity),
            flags,
            routing,
            handler,
            summary,
        }
    }

    /// Validate the argument count of a call.
    pub fn check_arity(&self, cmd: &ParsedCommand) -> Result<()> {
        if self.arity.accepts(cmd.arg_count()) {
            Ok(())
        } else {
            Err(cmd.wrong_arity())
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("flags", &self.flags)
            .field("routing", &self.routing)
            .field("summary", &self.summary)
            .finish()
    }
}

/// Registry of all available commands.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    /// Create a new command registry with all built-in commands.
    pub fn new() -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };
        registry.register_all();
        registry
    }

    /// Register a command.
    pub fn register(&mut self, cmd: Command) {
        self.commands.insert(cmd.name.to_uppercase(), cmd);
    }

    /// Look up a command by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Command> {
        match self.commands.get(name) {
            Some(cmd) => Some(cmd),
            None => self.commands.get(&name.to_uppercase()),
        }
    }

    /// Get all registered commands.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Get command count.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Register all built-in commands.
    fn register_all(&mut self) {
        self.register_string_commands();
        self.register_key_commands();
        self.register_list_commands();
        self.register_connection_commands();
    }

    fn register_string_commands(&mut self) {
        use strings::*;

        self.register(Command::new(
            "GET",
            1,
            CommandFlags::readonly(),
            Routing::FirstKey,
            cmd_get,
            "Get the value of a key",
        ));
        self.register(Command::new(
            "SET",
            2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_set,
            "Set the string value of a key",
        ));
        self.register(Command::new(
            "SETNX",
            2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_setnx,
            "Set the value of a key only if it does not exist",
        ));
        self.register(Command::new(
            "GETSET",
            2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_getset,
            "Set a key and return its old value",
        ));
        self.register(Command::new(
            "STRLEN",
            1,
            CommandFlags::readonly(),
            Routing::FirstKey,
            cmd_strlen,
            "Get the length of the value stored in a key",
        ));
    }

    fn register_key_commands(&mut self) {
        use keys::*;

        self.register(Command::new(
            "DEL",
            -1,
            CommandFlags::write(),
            Routing::Broadcast,
            cmd_del,
            "Delete one or more keys",
        ));
        self.register(Command::new(
            "EXISTS",
            -1,
            CommandFlags::readonly(),
            Routing::Broadcast,
            cmd_exists,
            "Count how many of the given keys exist",
        ));
        self.register(Command::new(
            "TYPE",
            1,
            CommandFlags::readonly(),
            Routing::FirstKey,
            cmd_type,
            "Determine the type stored at key",
        ));
        self.register(Command::new(
            "RENAME",
            2,
            CommandFlags::write(),
            Routing::SameNode,
            cmd_rename,
            "Rename a key",
        ));
        self.register(Command::new(
            "RENAMENX",
            2,
            CommandFlags::write(),
            Routing::SameNode,
            cmd_renamenx,
            "Rename a key only if the new key does not exist",
        ));
        self.register(Command::new(
            "KEYS",
            1,
            CommandFlags::READONLY,
            Routing::Broadcast,
            cmd_keys,
            "Find all keys matching a pattern",
        ));
        self.register(Command::new(
            "FLUSHDB",
            0,
            CommandFlags::write().union(CommandFlags::NO_KEYS),
            Routing::Broadcast,
            cmd_flushdb,
            "Remove all keys from the selected database",
        ));
        self.register(Command::new(
            "DBSIZE",
            0,
            CommandFlags::readonly().union(CommandFlags::NO_KEYS),
            Routing::Broadcast,
            cmd_dbsize,
            "Number of keys in the selected database",
        ));
    }

    fn register_list_commands(&mut self) {
        use lists::*;

        self.register(Command::new(
            "LPUSH",
            -2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_lpush,
            "Prepend values to a list",
        ));
        self.register(Command::new(
            "LPUSHX",
            -2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_lpushx,
            "Prepend values to a list only if it exists",
        ));
        self.register(Command::new(
            "RPUSH",
            -2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_rpush,
            "Append values to a list",
        ));
        self.register(Command::new(
            "RPUSHX",
            -2,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_rpushx,
            "Append values to a list only if it exists",
        ));
        self.register(Command::new(
            "LPOP",
            1,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_lpop,
            "Remove and get the first element of a list",
        ));
        self.register(Command::new(
            "RPOP",
            1,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_rpop,
            "Remove and get the last element of a list",
        ));
        self.register(Command::new(
            "RPOPLPUSH",
            2,
            CommandFlags::write(),
            Routing::SameNode,
            cmd_rpoplpush,
            "Pop from one list and push onto another",
        ));
        self.register(Command::new(
            "LREM",
            3,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_lrem,
            "Remove elements from a list",
        ));
        self.register(Command::new(
            "LSET",
            3,
            CommandFlags::write(),
            Routing::FirstKey,
            cmd_lset,
            "Set the value of an element in a list by its index",
        ));
        self.register(Command::new(
            "LINDEX",
            2,
            CommandFlags::readonly(),
            Routing::FirstKey,
            cmd_lindex,
            "Get an element from a list by its index",
        ));
        self.register(Command::new(
            "LLEN",
            1,
            CommandFlags::readonly(),
            Routing::FirstKey,
            cmd_llen,
            "Get the length of a list",
        ));
        self.register(Command::new(
            "LRANGE",
            3,
            CommandFlags::READONLY,
            Routing::FirstKey,
            cmd_lrange,
            "Get a range of elements from a list",
        ));
    }

    fn register_connection_commands(&mut self) {
        use connection::*;

        self.register(Command::new(
            "PING",
            0,
            CommandFlags::connection(),
            Routing::Local,
            cmd_ping,
            "Ping the server",
        ));
        self.register(Command::new(
            "ECHO",
            1,
            CommandFlags::connection(),
            Routing::Local,
            cmd_echo,
            "Echo the given string",
        ));
        self.register(Command::new(
            "SELECT",
            1,
            CommandFlags::connection(),
            Routing::Local,
            cmd_select,
            "Change the selected database for the current connection",
        ));
        self.register(Command::new(
            "PEERLINK",
            0,
            CommandFlags::admin(),
            Routing::Local,
            cmd_peerlink,
            "Mark this connection as a link from another cluster node",
        ));
    }
}
