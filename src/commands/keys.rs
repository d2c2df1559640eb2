//! Key management command implementations.

use super::{CommandContext, ParsedCommand};
use crate::Result;
use crate::protocol::Frame;
use crate::storage::RenameOutcome;
use crate::types::Key;

/// Status reply for a rename whose source key is missing.
const NO_SUCH_KEY: &str = "no such key";

/// DEL key [key ...]
pub fn cmd_del(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let deleted = ctx.db.delete_multi(cmd.args.iter().map(|k| k.as_ref()));
    if deleted > 0 {
        ctx.persist();
    }
    Ok(Frame::Integer(deleted as i64))
}

/// EXISTS key [key ...]
pub fn cmd_exists(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let count = cmd.args.iter().filter(|k| ctx.db.exists(k)).count();
    Ok(Frame::Integer(count as i64))
}

/// TYPE key
pub fn cmd_type(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let name = ctx.db.key_type(&cmd.args[0]).map_or("none", |t| t.as_str());
    Ok(Frame::simple(name))
}

/// RENAME key newkey
///
/// A missing source is answered with a status, not an error.
pub fn cmd_rename(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let new_key = Key::from(cmd.args[1].clone());
    if !ctx.db.rename(&cmd.args[0], new_key) {
        return Ok(Frame::simple(NO_SUCH_KEY));
    }
    ctx.persist();
    Ok(Frame::ok())
}

/// RENAMENX key newkey
pub fn cmd_renamenx(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let new_key = Key::from(cmd.args[1].clone());
    match ctx.db.rename_nx(&cmd.args[0], new_key) {
        RenameOutcome::Renamed => {
            ctx.persist();
            Ok(Frame::ok())
        }
        RenameOutcome::DestinationExists => Ok(Frame::Integer(0)),
        RenameOutcome::NoSuchKey => Ok(Frame::simple(NO_SUCH_KEY)),
    }
}

/// KEYS pattern
pub fn cmd_keys(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let keys = ctx.db.keys(&cmd.args[0]);
    Ok(Frame::Array(
        keys.into_iter().map(|k| Frame::Bulk(k.into())).collect(),
    ))
}

/// FLUSHDB
pub fn cmd_flushdb(_cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    ctx.db.flush();
    ctx.persist();
    Ok(Frame::ok())
}

/// DBSIZE
pub fn cmd_dbsize(_cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    Ok(Frame::Integer(ctx.db.len() as i64))
}
