//! AOF (Append Only File) persistence implementation.
//!
//! Every accepted write is handed to a single background writer through a
//! bounded queue. The writer keeps track of the database its last record
//! belonged to and emits a `SELECT` record whenever that changes, so the
//! file is a plain command stream that replays through the normal executor.
//!
//! # Fsync Policies
//!
//! - **Always**: Fsync after every write (safest, slowest)
//! - **EverySec**: Fsync once per second (good balance)
//! - **No**: Let the OS handle fsyncing (fastest, least safe)

use crate::Result;
use crate::commands::{CommandExecutor, ParsedCommand};
use crate::error::{Error, StorageError};
use crate::protocol::{Frame, FrameReader};
use crate::server::ClientState;
use crate::types::DbIndex;
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// AOF fsync policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AofFsync {
    /// Fsync after every write command
    Always,
    /// Fsync once per second
    #[default]
    EverySec,
    /// Never explicitly fsync (let the OS decide)
    No,
}

impl AofFsync {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "always" => Some(Self::Always),
            "everysec" => Some(Self::EverySec),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// One accepted write, tagged with the database it ran against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AofRecord {
    /// Database the command ran against
    pub db: DbIndex,
    /// Full command line, name first
    pub args: Vec<Bytes>,
}

/// Producer side of the AOF queue.
#[derive(Debug, Clone)]
pub struct AofHandle {
    tx: mpsc::Sender<AofRecord>,
}

impl AofHandle {
    /// Create a handle and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AofRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a record, waiting for room if the queue is full.
    pub async fn append(&self, db: DbIndex, args: Vec<Bytes>) {
        if self.tx.send(AofRecord { db, args }).await.is_err() {
            warn!(db, "AOF writer has stopped, record dropped");
        }
    }
}

/// AOF writer for appending commands to the AOF file.
#[derive(Debug)]
pub struct AofWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    fsync_policy: AofFsync,
    /// Database of the last record that reached the file; `None` until one has
    current_db: Option<DbIndex>,
    needs_fsync: bool,
    total_bytes: u64,
    buf: BytesMut,
}

impl AofWriter {
    /// Open (or create) the AOF for appending.
    pub async fn open<P: AsRef<Path>>(path: P, fsync_policy: AofFsync) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(StorageError::Io)?;

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(64 * 1024, file),
            fsync_policy,
            current_db: None,
            needs_fsync: false,
            total_bytes: 0,
            buf: BytesMut::with_capacity(256),
        })
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get total bytes written.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Write one record, preceded by a `SELECT` if its database differs
    /// from the previous record's.
    pub async fn write_record(&mut self, record: &AofRecord) -> Result<()> {
        self.buf.clear();
        if self.current_db != Some(record.db) {
            Frame::command([Bytes::from_static(b"SELECT"), Bytes::from(record.db.to_string())])
                .serialize(&mut self.buf);
        }
        Frame::command(record.args.iter().cloned()).serialize(&mut self.buf);

        self.writer
            .write_all(&self.buf)
            .await
            .map_err(StorageError::Io)?;
        self.current_db = Some(record.db);
        self.total_bytes += self.buf.len() as u64;
        self.needs_fsync = true;

        match self.fsync_policy {
            AofFsync::Always => self.fsync().await?,
            AofFsync::EverySec => {}
            AofFsync::No => self.writer.flush().await.map_err(StorageError::Io)?,
        }
        Ok(())
    }

    /// Flush buffered bytes and fsync the file.
    pub async fn fsync(&mut self) -> Result<()> {
        if self.needs_fsync {
            self.writer.flush().await.map_err(StorageError::Io)?;
            self.writer
                .get_ref()
                .sync_data()
                .await
                .map_err(StorageError::Io)?;
            self.needs_fsync = false;
        }
        Ok(())
    }

    /// Drain the queue until every producer is gone.
    ///
    /// A record that fails to write is logged and skipped.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<AofRecord>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let periodic = self.fsync_policy == AofFsync::EverySec;
        let mut stopping = false;

        loop {
            tokio::select! {
                _ = stop.changed(), if !stopping => {
                    // Refuse new records; those already queued are still written.
                    debug!(queued = rx.len(), "AOF writer stopping");
                    rx.close();
                    stopping = true;
                }
                record = rx.recv() => match record {
                    Some(record) => {
                        if let Err(e) = self.write_record(&record).await {
                            error!(path = %self.path.display(), db = record.db, "failed to write AOF record, skipping: {}", e);
                        }
                    }
                    None => break,
                },
                _ = tick.tick(), if periodic => {
                    if let Err(e) = self.fsync().await {
                        error!(path = %self.path.display(), "AOF fsync failed: {}", e);
                    }
                }
            }
        }

        // Final flush regardless of policy.
        self.needs_fsync = true;
        if let Err(e) = self.fsync().await {
            error!(path = %self.path.display(), "final AOF fsync failed: {}", e);
        }
        info!(path = %self.path.display(), bytes = self.total_bytes, "AOF writer stopped");
    }
}

/// A running AOF writer task.
#[derive(Debug)]
pub struct AofTask {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl AofTask {
    /// Close the queue, write out what it still holds and wait for the
    /// writer to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        self.join().await;
    }

    /// Wait for the writer to finish on its own, which happens once every
    /// handle has been dropped.
    pub async fn join(self) {
        let AofTask { stop, join } = self;
        if let Err(e) = join.await {
            error!("AOF writer task failed: {}", e);
        }
        drop(stop);
    }
}

/// Open the AOF and start its writer task.
pub async fn start_writer<P: AsRef<Path>>(
    path: P,
    fsync_policy: AofFsync,
    capacity: usize,
) -> Result<(AofHandle, AofTask)> {
    let writer = AofWriter::open(path, fsync_policy).await?;
    info!(path = %writer.path().display(), ?fsync_policy, capacity, "AOF writer started");
    let (handle, rx) = AofHandle::channel(capacity);
    let (stop, stop_rx) = watch::channel(false);
    let join = tokio::spawn(writer.run(rx, stop_rx));
    Ok((handle, AofTask { stop, join }))
}

/// Outcome of an AOF replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Commands executed
    pub commands: u64,
    /// Executed commands that answered with an error
    pub failed: u64,
    /// Units that could not be decoded into a command
    pub skipped: u64,
}

/// Replay an AOF through `executor`.
///
/// Best effort: undecodable units and failing commands are logged and
/// skipped, end of file ends replay, an I/O error stops it early. A missing
/// file is not an error.
pub async fn replay<P: AsRef<Path>>(path: P, executor: &CommandExecutor) -> Result<ReplayStats> {
    let path = path.as_ref();
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no AOF to replay");
            return Ok(ReplayStats::default());
        }
        Err(e) => return Err(StorageError::Io(e).into()),
    };

    let client = ClientState::detached();
    let mut reader = FrameReader::new(file);
    let mut stats = ReplayStats::default();

    while let Some(next) = reader.next_frame().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(Error::Protocol(e)) => {
                warn!(path = %path.display(), "skipping malformed AOF entry: {}", e);
                stats.skipped += 1;
                continue;
            }
            Err(Error::EndOfStream) => break,
            Err(e) => {
                error!(path = %path.display(), "AOF replay stopped early: {}", e);
                break;
            }
        };

        let cmd = match ParsedCommand::from_frame(frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(path = %path.display(), "skipping AOF entry that is not a command: {}", e);
                stats.skipped += 1;
                continue;
            }
        };

        stats.commands += 1;
        let name = cmd.name.clone();
        if let Err(e) = executor.execute(cmd, &client).await {
            warn!(command = %name, "replayed command failed: {}", e);
            stats.failed += 1;
        }
    }

    info!(
        path = %path.display(),
        commands = stats.commands,
        failed = stats.failed,
        skipped = stats.skipped,
        "AOF replay finished"
    );
    Ok(stats)
}
