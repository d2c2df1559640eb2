//! List command implementations.
//!
//! Lists are created by the first push and removed from the keyspace as soon
//! as their last element goes.

use super::{CommandContext, ParsedCommand};
use crate::Result;
use crate::error::CommandError;
use crate::protocol::Frame;
use crate::types::{Key, ValueList, ValueType};

/// Which end of a list an operation works on.
#[derive(Debug, Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn push(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>, end: End, only_existing: bool) -> Result<Frame> {
    let values = &cmd.args[1..];
    let fill = |list: &mut ValueList| {
        for value in values {
            match end {
                End::Head => list.push_front(value.clone()),
                End::Tail => list.push_back(value.clone()),
            }
        }
        list.len()
    };

    let len = if only_existing {
        match ctx.db.update_list(&cmd.args[0], fill)? {
            Some(len) => len,
            None => return Ok(Frame::Integer(0)),
        }
    } else {
        ctx.db.upsert_list(Key::from(cmd.args[0].clone()), fill)?
    };

    ctx.persist();
    Ok(Frame::Integer(len as i64))
}

fn pop(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>, end: End) -> Result<Frame> {
    let popped = ctx.db.update_list(&cmd.args[0], |list| match end {
        End::Head => list.pop_front(),
        End::Tail => list.pop_back(),
    })?;

    match popped.flatten() {
        Some(value) => {
            ctx.persist();
            Ok(Frame::Bulk(value))
        }
        None => Ok(Frame::Null),
    }
}

/// LPUSH key element [element ...]
pub fn cmd_lpush(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    push(cmd, ctx, End::Head, false)
}

/// LPUSHX key element [element ...]
pub fn cmd_lpushx(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    push(cmd, ctx, End::Head, true)
}

/// RPUSH key element [element ...]
pub fn cmd_rpush(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    push(cmd, ctx, End::Tail, false)
}

/// RPUSHX key element [element ...]
pub fn cmd_rpushx(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    push(cmd, ctx, End::Tail, true)
}

/// LPOP key
pub fn cmd_lpop(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    pop(cmd, ctx, End::Head)
}

/// RPOP key
pub fn cmd_rpop(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    pop(cmd, ctx, End::Tail)
}

/// RPOPLPUSH source destination
pub fn cmd_rpoplpush(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    // Refuse before popping so a wrong-typed destination loses nothing.
    ctx.db.ensure_type(&cmd.args[1], ValueType::List)?;

    let value = match ctx.db.update_list(&cmd.args[0], |list| list.pop_back())? {
        Some(Some(value)) => value,
        _ => return Ok(Frame::Null),
    };

    let destination = Key::from(cmd.args[1].clone());
    ctx.db
        .upsert_list(destination, |list| list.push_front(value.clone()))?;
    ctx.persist();
    Ok(Frame::Bulk(value))
}

/// LREM key count element
pub fn cmd_lrem(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let count = cmd.get_i64(1)?;
    let element = &cmd.args[2];

    let removed = ctx
        .db
        .update_list(&cmd.args[0], |list| list.remove(count, element))?
        .unwrap_or(0);
    if removed > 0 {
        ctx.persist();
    }
    Ok(Frame::Integer(removed as i64))
}

/// LSET key index element
///
/// An out-of-range index is an error and leaves the list untouched.
pub fn cmd_lset(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let index = cmd.get_i64(1)?;
    let value = cmd.args[2].clone();

    match ctx.db.update_list(&cmd.args[0], |list| list.set(index, value))? {
        None => Err(CommandError::NoSuchKey.into()),
        Some(false) => Err(CommandError::IndexOutOfRange.into()),
        Some(true) => {
            ctx.persist();
            Ok(Frame::ok())
        }
    }
}

/// LINDEX key index
pub fn cmd_lindex(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let index = cmd.get_i64(1)?;
    let value = ctx
        .db
        .read_list(&cmd.args[0], |list| list.get(index).cloned())?
        .flatten();
    Ok(value.map_or(Frame::Null, Frame::Bulk))
}

/// LLEN key
pub fn cmd_llen(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let len = ctx.db.read_list(&cmd.args[0], ValueList::len)?.unwrap_or(0);
    Ok(Frame::Integer(len as i64))
}

/// LRANGE key start stop
pub fn cmd_lrange(cmd: &ParsedCommand, ctx: &mut CommandContext<'_>) -> Result<Frame> {
    let start = cmd.get_i64(1)?;
    let stop = cmd.get_i64(2)?;

    let items = ctx
        .db
        .read_list(&cmd.args[0], |list| list.range(start, stop))?
        .unwrap_or_default();
    Ok(Frame::Array(items.into_iter().map(Frame::Bulk).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::invoke as run;
    use crate::commands::strings::cmd_set;
    use crate::error::Error;
    use crate::storage::Db;
    use proptest::prelude::*;

    fn range_of(db: &Db, key: &str) -> Vec<String> {
        let reply = run(cmd_lrange, db, &["LRANGE", key, "0", "-1"]).0.unwrap();
        reply
            .as_array()
            .unwrap()
            .iter()
            .map(|f| String::from_utf8(f.as_bytes().unwrap().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_push_pop_scenario() {
        let db = Db::new(0);
        let (reply, persisted) = run(cmd_rpush, &db, &["RPUSH", "mylist", "a", "b", "c"]);
        assert_eq!(reply.unwrap(), Frame::Integer(3));
        assert!(persisted);
        assert_eq!(range_of(&db, "mylist"), ["a", "b", "c"]);

        let (reply, persisted) = run(cmd_lpop, &db, &["LPOP", "mylist"]);
        assert_eq!(reply.unwrap(), Frame::bulk("a"));
        assert!(persisted);
        assert_eq!(run(cmd_llen, &db, &["LLEN", "mylist"]).0.unwrap(), Frame::Integer(2));
    }

    #[test]
    fn test_lpush_prepends_in_argument_order() {
        let db = Db::new(0);
        run(cmd_lpush, &db, &["LPUSH", "l", "a", "b", "c"]).0.unwrap();
        assert_eq!(range_of(&db, "l"), ["c", "b", "a"]);
    }

    #[test]
    fn test_pushx_requires_existing_list() {
        let db = Db::new(0);
        let (reply, persisted) = run(cmd_rpushx, &db, &["RPUSHX", "l", "a"]);
        assert_eq!(reply.unwrap(), Frame::Integer(0));
        assert!(!persisted);
        assert!(!db.exists(b"l"));

        run(cmd_rpush, &db, &["RPUSH", "l", "a"]).0.unwrap();
        let (reply, _) = run(cmd_lpushx, &db, &["LPUSHX", "l", "z"]);
        assert_eq!(reply.unwrap(), Frame::Integer(2));
        assert_eq!(range_of(&db, "l"), ["z", "a"]);
    }

    #[test]
    fn test_pop_absent_is_null_and_empty_list_is_removed() {
        let db = Db::new(0);
        let (reply, persisted) = run(cmd_rpop, &db, &["RPOP", "l"]);
        assert_eq!(reply.unwrap(), Frame::Null);
        assert!(!persisted);

        run(cmd_rpush, &db, &["RPUSH", "l", "only"]).0.unwrap();
        assert_eq!(run(cmd_rpop, &db, &["RPOP", "l"]).0.unwrap(), Frame::bulk("only"));
        assert!(!db.exists(b"l"));
        assert_eq!(run(cmd_lpop, &db, &["LPOP", "l"]).0.unwrap(), Frame::Null);
    }

    #[test]
    fn test_rpoplpush() {
        let db = Db::new(0);
        run(cmd_rpush, &db, &["RPUSH", "src", "a", "b"]).0.unwrap();

        let (reply, persisted) = run(cmd_rpoplpush, &db, &["RPOPLPUSH", "src", "dst"]);
        assert_eq!(reply.unwrap(), Frame::bulk("b"));
        assert!(persisted);
        assert_eq!(range_of(&db, "src"), ["a"]);
        assert_eq!(range_of(&db, "dst"), ["b"]);

        // rotation on a single list
        run(cmd_rpush, &db, &["RPUSH", "rot", "1", "2", "3"]).0.unwrap();
        run(cmd_rpoplpush, &db, &["RPOPLPUSH", "rot", "rot"]).0.unwrap();
        assert_eq!(range_of(&db, "rot"), ["3", "1", "2"]);

        let (reply, _) = run(cmd_rpoplpush, &db, &["RPOPLPUSH", "none", "dst"]);
        assert_eq!(reply.unwrap(), Frame::Null);
    }

    #[test]
    fn test_rpoplpush_wrong_type_destination_keeps_source() {
        let db = Db::new(0);
        run(cmd_rpush, &db, &["RPUSH", "src", "a"]).0.unwrap();
        run(cmd_set, &db, &["SET", "str", "x"]).0.unwrap();

        let (reply, persisted) = run(cmd_rpoplpush, &db, &["RPOPLPUSH", "src", "str"]);
        assert!(matches!(reply, Err(Error::Command(CommandError::WrongType))));
        assert!(!persisted);
        assert_eq!(range_of(&db, "src"), ["a"]);
    }

    #[test]
    fn test_lrem() {
        let db = Db::new(0);
        run(cmd_rpush, &db, &["RPUSH", "l", "a", "b", "a", "c", "a"]).0.unwrap();

        let (reply, persisted) = run(cmd_lrem, &db, &["LREM", "l", "-2", "a"]);
        assert_eq!(reply.unwrap(), Frame::Integer(2));
        assert!(persisted);
        assert_eq!(range_of(&db, "l"), ["a", "b", "c"]);

        let (reply, persisted) = run(cmd_lrem, &db, &["LREM", "l", "0", "zzz"]);
        assert_eq!(reply.unwrap(), Frame::Integer(0));
        assert!(!persisted);

        let (reply, _) = run(cmd_lrem, &db, &["LREM", "l", "x", "a"]);
        assert!(matches!(reply, Err(Error::Command(CommandError::NotInteger))));
    }

    #[test]
    fn test_lset() {
        let db = Db::new(0);
        let (reply, _) = run(cmd_lset, &db, &["LSET", "l", "0", "x"]);
        assert!(matches!(reply, Err(Error::Command(CommandError::NoSuchKey))));

        run(cmd_rpush, &db, &["RPUSH", "l", "a", "b"]).0.unwrap();
        let (reply, persisted) = run(cmd_lset, &db, &["LSET", "l", "5", "x"]);
        assert!(matches!(reply, Err(Error::Command(CommandError::IndexOutOfRange))));
        assert!(!persisted);
        assert_eq!(range_of(&db, "l"), ["a", "b"]);

        let (reply, persisted) = run(cmd_lset, &db, &["LSET", "l", "-1", "z"]);
        assert_eq!(reply.unwrap(), Frame::ok());
        assert!(persisted);
        assert_eq!(range_of(&db, "l"), ["a", "z"]);
    }

    #[test]
    fn test_lindex_out_of_range_is_null() {
        let db = Db::new(0);
        run(cmd_rpush, &db, &["RPUSH", "l", "a", "b"]).0.unwrap();
        assert_eq!(run(cmd_lindex, &db, &["LINDEX", "l", "-1"]).0.unwrap(), Frame::bulk("b"));
        assert_eq!(run(cmd_lindex, &db, &["LINDEX", "l", "2"]).0.unwrap(), Frame::Null);
        assert_eq!(run(cmd_lindex, &db, &["LINDEX", "l", "-3"]).0.unwrap(), Frame::Null);
        assert_eq!(run(cmd_lindex, &db, &["LINDEX", "nope", "0"]).0.unwrap(), Frame::Null);
    }

    #[test]
    fn test_lrange_missing_key_is_empty_array() {
        let db = Db::new(0);
        assert_eq!(
            run(cmd_lrange, &db, &["LRANGE", "nope", "0", "-1"]).0.unwrap(),
            Frame::empty_array()
        );
    }

    #[test]
    fn test_list_commands_on_string_key() {
        let db = Db::new(0);
        run(cmd_set, &db, &["SET", "s", "v"]).0.unwrap();
        for parts in [
            &["LPUSH", "s", "x"][..],
            &["RPOP", "s"][..],
            &["LLEN", "s"][..],
            &["LRANGE", "s", "0", "1"][..],
        ] {
            let handler = match parts[0] {
                "LPUSH" => cmd_lpush,
                "RPOP" => cmd_rpop,
                "LLEN" => cmd_llen,
                _ => cmd_lrange,
            };
            let (reply, persisted) = run(handler, &db, parts);
            assert!(matches!(reply, Err(Error::Command(CommandError::WrongType))));
            assert!(!persisted);
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        LPush(u8),
        RPush(u8),
        LPop,
        RPop,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::LPush),
            any::<u8>().prop_map(Op::RPush),
            Just(Op::LPop),
            Just(Op::RPop),
        ]
    }

    proptest! {
        #[test]
        fn llen_tracks_pushes_and_pops(ops in prop::collection::vec(arb_op(), 0..64)) {
            let db = Db::new(0);
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    Op::LPush(v) => {
                        let v = v.to_string();
                        run(cmd_lpush, &db, &["LPUSH", "k", &v]).0.unwrap();
                        model.push_front(v);
                    }
                    Op::RPush(v) => {
                        let v = v.to_string();
                        run(cmd_rpush, &db, &["RPUSH", "k", &v]).0.unwrap();
                        model.push_back(v);
                    }
                    Op::LPop => {
                        let reply = run(cmd_lpop, &db, &["LPOP", "k"]).0.unwrap();
                        let expected = model.pop_front();
                        prop_assert_eq!(reply.as_bytes().map(<[u8]>::to_vec), expected.map(String::into_bytes));
                    }
                    Op::RPop => {
                        let reply = run(cmd_rpop, &db, &["RPOP", "k"]).0.unwrap();
                        let expected = model.pop_back();
                        prop_assert_eq!(reply.as_bytes().map(<[u8]>::to_vec), expected.map(String::into_bytes));
                    }
                }

                let len = run(cmd_llen, &db, &["LLEN", "k"]).0.unwrap();
                prop_assert_eq!(len, Frame::Integer(model.len() as i64));
                let last = run(cmd_lindex, &db, &["LINDEX", "k", "-1"]).0.unwrap();
                prop_assert_eq!(last.as_bytes().map(<[u8]>::to_vec), model.back().map(|s| s.clone().into_bytes()));
            }

            prop_assert_eq!(range_of(&db, "k"), Vec::from(model));
            prop_assert_eq!(db.exists(b"k"), !range_of(&db, "k").is_empty());
        }
    }
}
