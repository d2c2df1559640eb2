//! # Ringstore
//!
//! An in-memory key-value store speaking RESP, with an optional append-only
//! durability log and optional sharding across cooperating nodes.
//!
//! - RESP codec shared by the server, the AOF and peer connections
//! - Strings, lists, key management and per-connection database selection
//! - AOF persistence with a single background writer and startup replay
//! - Consistent-hash clustering with pooled relays and broadcast commands
//!
//! ## Example
//!
//! ```no_run
//! use ringstore::{Server, Config, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let server = Arc::new(Server::new(config).await?);
//!     server.run().await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_lifetimes,
    unused_qualifications
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::new_without_default,
    missing_docs
)]

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

/// Consistent-hash routing, peer pools and relays.
pub mod cluster;
/// Command parsing and execution layer.
pub mod commands;
/// Error types and result aliases.
pub mod error;
/// AOF persistence.
pub mod persistence;
/// RESP protocol implementation.
pub mod protocol;
/// TCP server and connection management.
pub mod server;
/// In-memory key-value storage engine.
pub mod storage;
/// Stored value types.
pub mod types;

// ─────────────────────────────────────────────────────────────────────────────
// Common Re-exports
// ─────────────────────────────────────────────────────────────────────────────

// Error handling
pub use error::{Error, Result};

// Protocol
pub use protocol::{Frame, FrameReader, RespParser};

// Server
pub use server::{Config, Server};

// Storage
pub use storage::Database;

// Types
pub use types::{Key, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server port.
pub const DEFAULT_PORT: u16 = 6379;

/// Maximum header line length (64 KiB).
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Maximum bulk string size (512 MiB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one array.
pub const MAX_ARGUMENTS: usize = 1_000_000;

/// Maximum array nesting depth.
pub const MAX_NESTING: usize = 32;

/// Maximum number of concurrent clients.
pub const MAX_CLIENTS: usize = 10_000;
