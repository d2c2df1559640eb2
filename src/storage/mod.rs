//! Storage engine.
//!
//! One concurrent keyspace per logical database, grouped into a fixed-size
//! [`Database`] set.

mod db;

pub use db::{Database, Db, RenameOutcome};
