//! Property-based tests using proptest.
//!
//! These drive the executor with generated command sequences and check
//! invariants that must hold for any of them.

use bytes::Bytes;
use proptest::prelude::*;
use ringstore::commands::{CommandExecutor, CommandRegistry, ParsedCommand};
use ringstore::persistence::{self, AofFsync};
use ringstore::server::ClientState;
use ringstore::storage::Database;
use std::sync::Arc;

const DATABASES: usize = 4;

fn executor() -> CommandExecutor {
    CommandExecutor::new(
        Arc::new(CommandRegistry::new()),
        Arc::new(Database::new(DATABASES)),
    )
}

fn command(parts: Vec<String>) -> ParsedCommand {
    ParsedCommand::from_args(parts.into_iter().map(Bytes::from).collect()).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Generate a small key so that commands collide often
fn arb_key() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "l1", "l2"]).prop_map(String::from)
}

fn arb_value() -> impl Strategy<Value = String> {
    "[a-z0-9]{0,6}"
}

/// Generate a command line; some of them fail, which is part of the point
fn arb_command() -> impl Strategy<Value = Vec<String>> {
    let v = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    prop_oneof![
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["SET", &k, &x])),
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["SETNX", &k, &x])),
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["GETSET", &k, &x])),
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["RPUSH", &k, &x])),
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["LPUSH", &k, &x])),
        (arb_key(), arb_value()).prop_map(move |(k, x)| v(&["LPUSHX", &k, &x])),
        arb_key().prop_map(move |k| v(&["LPOP", &k])),
        arb_key().prop_map(move |k| v(&["RPOP", &k])),
        (arb_key(), arb_key()).prop_map(move |(k, d)| v(&["RPOPLPUSH", &k, &d])),
        (arb_key(), -3i64..3, arb_value())
            .prop_map(move |(k, i, x)| v(&["LSET", &k, &i.to_string(), &x])),
        (arb_key(), -2i64..3, arb_value())
            .prop_map(move |(k, n, x)| v(&["LREM", &k, &n.to_string(), &x])),
        (arb_key(), arb_key()).prop_map(move |(k, d)| v(&["RENAME", &k, &d])),
        (arb_key(), arb_key()).prop_map(move |(k, d)| v(&["RENAMENX", &k, &d])),
        arb_key().prop_map(move |k| v(&["DEL", &k])),
        arb_key().prop_map(move |k| v(&["GET", &k])),
        (0..DATABASES).prop_map(move |db| v(&["SELECT", &db.to_string()])),
        Just(v(&["FLUSHDB"])),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Replaying the log of a run rebuilds exactly the keyspace of that run
    #[test]
    fn prop_aof_replay_is_deterministic(
        commands in prop::collection::vec(arb_command(), 1..80)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");

        let (direct, replayed) = runtime().block_on(async move {
            let (handle, task) = persistence::start_writer(&path, AofFsync::No, 8)
                .await
                .unwrap();
            let logged = executor().with_aof(handle);
            let client = ClientState::detached();
            for parts in commands {
                let _ = logged.execute(command(parts), &client).await;
            }
            let direct = logged.database().snapshot();
            drop(logged);
            task.join().await;

            let fresh = executor();
            persistence::replay(&path, &fresh).await.unwrap();
            (direct, fresh.database().snapshot())
        });

        prop_assert_eq!(direct, replayed);
    }

    /// RPUSH appends, LPUSH prepends, LRANGE 0 -1 shows the result
    #[test]
    fn prop_push_order(ops in prop::collection::vec((any::<bool>(), "[a-z]{1,4}"), 1..40)) {
        let exec = executor();
        let client = ClientState::detached();
        let mut model = std::collections::VecDeque::new();

        runtime().block_on(async {
            for (tail, value) in &ops {
                let name = if *tail { "RPUSH" } else { "LPUSH" };
                exec.execute(command(vec![name.into(), "l".into(), value.clone()]), &client)
                    .await
                    .unwrap();
                if *tail {
                    model.push_back(Bytes::from(value.clone()));
                } else {
                    model.push_front(Bytes::from(value.clone()));
                }
            }
        });

        let db = exec.database().get_db(0).unwrap();
        let stored = db.read_list(b"l", |l| l.range(0, -1)).unwrap().unwrap();
        prop_assert_eq!(stored, model.into_iter().collect::<Vec<_>>());
    }
}
