//! Benchmarks for the keyspace.

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ringstore::storage::Db;
use ringstore::types::{Key, Value};
use std::sync::Arc;
use std::thread;

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("strings");

    for size in [64, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("set", size), &size, |b, &size| {
            let db = Db::new(0);
            let value = Bytes::from(vec![b'x'; size]);
            let mut i = 0u64;
            b.iter(|| {
                i = (i + 1) % 10_000;
                db.set(Key::from(format!("key:{i}").as_str()), Value::string(value.clone()));
            });
        });
    }

    let db = Db::new(0);
    for i in 0..10_000 {
        db.set(Key::from(format!("key:{i}").as_str()), Value::string("v"));
    }
    group.bench_function("get_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 10_000;
            black_box(db.get_string(format!("key:{i}").as_bytes()).unwrap());
        });
    });

    group.finish();
}

fn bench_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("lists");

    group.bench_function("push_pop", |b| {
        let db = Db::new(0);
        b.iter(|| {
            db.upsert_list(Key::from("q"), |l| l.push_back(Bytes::from_static(b"job")))
                .unwrap();
            black_box(db.update_list(b"q", |l| l.pop_front()).unwrap());
        });
    });

    let db = Db::new(0);
    db.upsert_list(Key::from("big"), |l| {
        for i in 0..1_000 {
            l.push_back(Bytes::from(i.to_string()));
        }
    })
    .unwrap();
    group.bench_function("range_100", |b| {
        b.iter(|| black_box(db.read_list(b"big", |l| l.range(450, 549)).unwrap()));
    });
    group.bench_function("index_middle", |b| {
        b.iter(|| black_box(db.read_list(b"big", |l| l.get(500).cloned()).unwrap()));
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("read_heavy", threads), &threads, |b, &threads| {
            let db = Arc::new(Db::new(0));
            for i in 0..1_000 {
                db.set(Key::from(format!("k{i}").as_str()), Value::string("v"));
            }
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let db = Arc::clone(&db);
                        thread::spawn(move || {
                            for i in 0..1_000 {
                                let key = format!("k{}", (i + t * 7) % 1_000);
                                if i % 10 == 0 {
                                    db.set(Key::from(key.as_str()), Value::string("w"));
                                } else {
                                    black_box(db.get_string(key.as_bytes()).ok());
                                }
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strings, bench_lists, bench_concurrent);
criterion_main!(benches);
