//! Error types for ringstore.
//!
//! Every failure mode of the server funnels into [`Error`]. Protocol and
//! command errors become error replies and leave the session open; I/O
//! errors and end of stream are terminal for whatever is reading.

use std::io;
use thiserror::Error;

/// Result type alias for ringstore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ringstore.
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol parsing errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command execution errors
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cluster routing errors
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The byte stream ended
    #[error("end of stream")]
    EndOfStream,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Protocol-level errors during RESP decoding.
///
/// A protocol error only invalidates the unit being decoded; the decoder
/// resets and keeps going with the bytes that follow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Invalid RESP data type marker
    #[error("invalid type marker: {0:?}")]
    InvalidTypeMarker(u8),

    /// Invalid UTF-8 in a status or error line
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid bulk string length
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Invalid array length
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Line too long (header without terminator)
    #[error("line too long: {len} bytes (max: {max})")]
    LineTooLong {
        /// Actual line length in bytes
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Bulk string too large
    #[error("bulk string too large: {len} bytes (max: {max})")]
    BulkTooLarge {
        /// Actual bulk string length in bytes
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Too many array elements
    #[error("too many array elements: {count} (max: {max})")]
    TooManyElements {
        /// Actual element count
        count: usize,
        /// Maximum allowed count
        max: usize,
    },

    /// Arrays nested deeper than the decoder allows
    #[error("arrays nested too deeply (max depth: {0})")]
    NestingTooDeep(usize),

    /// Missing CRLF terminator
    #[error("missing CRLF terminator")]
    MissingCrlf,

    /// A command frame that is not an array of bulk strings
    #[error("expected an array of bulk strings")]
    NotACommand,
}

/// Command execution errors.
///
/// The display strings are the exact error replies sent to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Wrong number of arguments
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity {
        /// Command name that received wrong arity
        command: String,
    },

    /// Wrong type for operation
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Syntax error
    #[error("ERR syntax error")]
    SyntaxError,

    /// Not an integer
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// SELECT argument is not a number
    #[error("ERR invalid DB index")]
    InvalidDbIndex,

    /// No such key
    #[error("ERR no such key")]
    NoSuchKey,

    /// Index out of bounds
    #[error("ERR index out of range")]
    IndexOutOfRange,
}

/// Storage-level errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database index out of range
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while routing a command through the cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No pool is configured for the target node
    #[error("ERR no connection to peer {0}")]
    UnknownPeer(String),

    /// Dialing or talking to the peer failed
    #[error("ERR peer {peer} unavailable: {reason}")]
    PeerUnavailable {
        /// Peer address
        peer: String,
        /// What went wrong
        reason: String,
    },

    /// Every pooled connection to the peer is in use
    #[error("ERR connection pool for peer {0} is exhausted")]
    PoolExhausted(String),

    /// The peer did not answer before the relay deadline
    #[error("ERR relay to peer {0} timed out")]
    Timeout(String),

    /// A multi-key command whose keys are owned by different nodes
    #[error("ERR {command} keys must be owned by the same node")]
    CrossNode {
        /// Command that was refused
        command: String,
    },

    /// One node of a broadcast replied with an error
    #[error("ERR broadcast failed on {node}: {message}")]
    Broadcast {
        /// Node whose reply was an error
        node: String,
        /// The error reply it sent
        message: String,
    },

    /// A broadcast reply had a kind that cannot be aggregated
    #[error("ERR unexpected reply from {0}")]
    UnexpectedReply(String),
}

impl Error {
    /// Returns true if this error ends the session or stream that produced it.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::EndOfStream)
    }

    /// Returns true if this is a client error (4xx equivalent).
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::Command(_) | Error::Routing(_)
        )
    }

    /// Converts the error to the text of an error reply.
    #[must_use]
    pub fn to_reply_error(&self) -> String {
        match self {
            Error::Protocol(e) => format!("ERR Protocol error: {e}"),
            Error::Command(e) => e.to_string(),
            Error::Routing(e) => e.to_string(),
            Error::Storage(StorageError::DbIndexOutOfRange) => {
                StorageError::DbIndexOutOfRange.to_string()
            }
            Error::Storage(e) => format!("ERR {e}"),
            Error::Io(e) => format!("ERR I/O error: {e}"),
            Error::EndOfStream => "ERR connection closed".to_string(),
            Error::Config(e) => format!("ERR configuration error: {e}"),
            Error::Internal(e) => format!("ERR internal error: {e}"),
        }
    }
}
