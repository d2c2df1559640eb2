//! Connection command implementations.

use super::{CommandContext, ParsedCommand};
use crate::Result;
use crate::error::{CommandError, StorageError};
use crate::protocol::Frame;
use tracing::debug;

/// PING
pub fn cmd_ping(_cmd: &ParsedCommand, _ctx: &mut CommandContext<'_>) -> Result<Frame> {
    Ok(Frame::pong())
}

/// ECHO message
pub fn cmd_echo(cmd: &ParsedCommand, _ctx: &mut CommandContext<'_>) -> Result<Frame> {
    Ok(Frame::Bulk(cmd.args[0].clone()))
}

/// SELECT index
///
/// Changes the connection's database; never written to the AOF, the writer
/// emits its own SELECT records.
pub fn cmd_select(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let index: usize = cmd
        .get_str(0)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::InvalidDbIndex)?;

    if index >= ctx.databases {
        return Err(StorageError::DbIndexOutOfRange.into());
    }

    ctx.client.set_db_index(index);
    Ok(Frame::ok())
}

/// PEERLINK
///
/// Sent by another node on connections it relays through; commands arriving
/// on such a connection always run locally.
pub fn cmd_peerlink(_cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    debug!(client = ctx.client.id(), "connection marked as peer link");
    ctx.client.set_peer_link();
    Ok(Frame::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::server::ClientState;
    use crate::storage::Db;
    use bytes::Bytes;

    fn select(client: &ClientState, arg: &str) -> Result<Frame> {
        let db = Db::new(0);
        let cmd = ParsedCommand::from_args(vec![
            Bytes::from_static(b"SELECT"),
            Bytes::copy_from_slice(arg.as_bytes()),
        ])
        .unwrap();
        let mut ctx = CommandContext::new(&db, client, 16);
        cmd_select(&cmd, &mut ctx)
    }

    #[test]
    fn test_select() {
        let client = ClientState::detached();
        assert_eq!(select(&client, "5").unwrap(), Frame::ok());
        assert_eq!(client.db_index(), 5);
    }

    #[test]
    fn test_select_invalid() {
        let client = ClientState::detached();
        let err = select(&client, "abc").unwrap_err();
        assert_eq!(err.to_reply_error(), "ERR invalid DB index");

        let err = select(&client, "16").unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::DbIndexOutOfRange)));
        assert_eq!(err.to_reply_error(), "ERR DB index is out of range");

        assert!(select(&client, "-1").is_err());
        assert_eq!(client.db_index(), 0);
    }

    #[test]
    fn test_ping_echo() {
        let (reply, persisted) = crate::commands::invoke(cmd_ping, &Db::new(0), &["PING"]);
        assert_eq!(reply.unwrap(), Frame::pong());
        assert!(!persisted);

        let (reply, _) = crate::commands::invoke(cmd_echo, &Db::new(0), &["ECHO", "hi"]);
        assert_eq!(reply.unwrap(), Frame::bulk("hi"));
    }

    #[test]
    fn test_peerlink() {
        let client = ClientState::detached();
        let db = Db::new(0);
        let cmd = ParsedCommand::from_args(vec![Bytes::from_static(b"PEERLINK")]).unwrap();
        let mut ctx = CommandContext::new(&db, &client, 16);
        assert_eq!(cmd_peerlink(&cmd, &mut ctx).unwrap(), Frame::ok());
        assert!(client.is_peer_link());
    }
}
