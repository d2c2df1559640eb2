//! Persistence layer.
//!
//! Durability comes from a single append-only file of accepted write
//! commands, replayed through the regular executor at startup.

mod aof;

pub use aof::{
    AofFsync, AofHandle, AofRecord, AofTask, AofWriter, ReplayStats, replay, start_writer,
};

use std::path::PathBuf;

/// Default capacity of the queue between executors and the AOF writer.
pub const DEFAULT_AOF_QUEUE: usize = 1 << 16;

/// Configuration for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Whether writes are logged at all
    pub aof_enabled: bool,
    /// AOF file path
    pub aof_path: PathBuf,
    /// AOF fsync policy
    pub aof_fsync: AofFsync,
    /// Records that may wait for the writer before producers block
    pub aof_queue: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            aof_enabled: false,
            aof_path: PathBuf::from("appendonly.aof"),
            aof_fsync: AofFsync::EverySec,
            aof_queue: DEFAULT_AOF_QUEUE,
        }
    }
}
