//! Command executor - the main entry point for command processing.

use super::registry::CommandRegistry;
use super::{CommandContext, ParsedCommand};
use crate::Result;
use crate::error::{CommandError, Error};
use crate::persistence::AofHandle;
use crate::protocol::Frame;
use crate::server::ClientState;
use crate::storage::Database;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Command executor responsible for looking up and running commands against
/// the local keyspace.
#[derive(Debug)]
pub struct CommandExecutor {
    /// Command registry
    registry: Arc<CommandRegistry>,
    /// Database
    database: Arc<Database>,
    /// AOF producer, absent when persistence is off or during replay
    aof: Option<AofHandle>,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(registry: Arc<CommandRegistry>, database: Arc<Database>) -> Self {
        Self {
            registry,
            database,
            aof: None,
        }
    }

    /// Log accepted writes through `aof`.
    pub fn with_aof(mut self, aof: AofHandle) -> Self {
        self.aof = Some(aof);
        self
    }

    /// Get the command registry.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Get the database.
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Execute a command.
    ///
    /// A panic inside the handler is caught here and turned into an
    /// internal error; it never reaches the connection.
    pub async fn execute(&self, cmd: ParsedCommand, client: &ClientState) -> Result<Frame> {
        trace!(
            "Executing command: {} with {} args",
            cmd.name,
            cmd.arg_count()
        );

        // Look up command
        let command = self
            .registry
            .get(&cmd.name)
            .ok_or_else(|| Error::Command(CommandError::UnknownCommand(cmd.name.clone())))?;

        // Check argument count
        command.check_arity(&cmd)?;

        // Get the appropriate database
        let db_index = client.db_index();
        let db = self.database.get_db(db_index)?;

        let mut ctx = CommandContext::new(&db, client, self.database.len());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (command.handler)(&cmd, &mut ctx)));
        let persist = ctx.wants_persist();

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                error!(
                    command = %cmd.name,
                    client = client.id(),
                    panic = panic_message(payload.as_ref()),
                    "command handler panicked"
                );
                return Err(Error::Internal(format!(
                    "command '{}' failed",
                    cmd.name.to_lowercase()
                )));
            }
        };

        match &result {
            Ok(_) => {
                trace!("Command executed successfully");
                if persist && command.flags.is_write() {
                    if let Some(aof) = &self.aof {
                        aof.append(db_index, cmd.to_args()).await;
                    }
                }
            }
            Err(e) => debug!("Command failed: {}", e),
        }

        result
    }

    /// Execute a command and render any error as an error reply.
    pub async fn execute_to_frame(&self, cmd: ParsedCommand, client: &ClientState) -> Frame {
        match self.execute(cmd, client).await {
            Ok(frame) => frame,
            Err(e) => Frame::error(e.to_reply_error()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
