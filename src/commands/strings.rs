//! String command implementations.

use super::{CommandContext, ParsedCommand};
use crate::Result;
use crate::protocol::Frame;
use crate::types::{Key, Value};

/// GET key
pub fn cmd_get(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    match ctx.db.get_string(&cmd.args[0])? {
        Some(value) => Ok(Frame::Bulk(value)),
        None => Ok(Frame::Null),
    }
}

/// SET key value
pub fn cmd_set(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let key = Key::from(cmd.args[0].clone());
    ctx.db.set(key, Value::string(cmd.args[1].clone()));
    ctx.persist();
    Ok(Frame::ok())
}

/// SETNX key value
pub fn cmd_setnx(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let key = Key::from(cmd.args[0].clone());
    let stored = ctx.db.set_nx(key, Value::string(cmd.args[1].clone()));
    if stored {
        ctx.persist();
    }
    Ok(Frame::Integer(i64::from(stored)))
}

/// GETSET key value
pub fn cmd_getset(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let key = Key::from(cmd.args[0].clone());
    let old = ctx.db.get_set(key, cmd.args[1].clone())?;
    ctx.persist();
    Ok(old.map_or(Frame::Null, Frame::Bulk))
}

/// STRLEN key
///
/// An absent key answers with a null bulk, not zero.
pub fn cmd_strlen(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    match ctx.db.get_string(&cmd.args[0])? {
        Some(value) => Ok(Frame::Integer(value.len() as i64)),
        None => Ok(Frame::Null),
    }
}
