//! Property and concurrency tests for ordering and fan-out guarantees.

use logcast::{RecordId, Store, StoreConfig, SubscriptionConfig, Timestamp};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn status_code() -> impl Strategy<Value = u16> {
    100u16..600
}

proptest! {
    #[test]
    fn prop_ids_strictly_increasing(codes in prop::collection::vec(status_code(), 1..64)) {
        let store = Store::default();
        let ids: Vec<RecordId> = codes
            .iter()
            .map(|code| store.insert(*code, "prop").unwrap().id)
            .collect();

        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(ids[0], RecordId(1));
    }

    #[test]
    fn prop_scan_matches_filter(
        codes in prop::collection::vec(status_code(), 1..48),
        lo in 0usize..48,
        hi in 0usize..48,
    ) {
        let store = Store::default();
        let records: Vec<_> = codes
            .iter()
            .map(|code| store.insert(*code, "prop").unwrap())
            .collect();

        let t0 = records[lo % records.len()].timestamp;
        let t1 = records[hi % records.len()].timestamp;

        let expected: Vec<_> = records
            .iter()
            .filter(|r| t0 <= r.timestamp && r.timestamp <= t1)
            .cloned()
            .collect();
        let got = store.scan(t0, t1);

        prop_assert_eq!(&got, &expected);
        if t0 > t1 {
            prop_assert!(got.is_empty());
        }
        prop_assert!(got.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn prop_subscriber_sees_only_later_records(before in 0usize..20, after in 0usize..20) {
        let store = Store::default();
        for _ in 0..before {
            store.insert(200, "before").unwrap();
        }

        let handle = store.subscribe_with(SubscriptionConfig { buffer_size: 64 });
        let later: Vec<_> = (0..after)
            .map(|_| store.insert(201, "after").unwrap().id)
            .collect();

        let got: Vec<_> = handle.drain().iter().map(|r| r.id).collect();
        prop_assert_eq!(got, later);
    }
}

#[test]
fn test_concurrent_inserts_produce_contiguous_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let store = Store::shared(StoreConfig::default());
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| store.insert(200 + t as u16, "concurrent").unwrap().id.0)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for worker in workers {
        for id in worker.join().unwrap() {
            assert!(ids.insert(id), "duplicate id {}", id);
        }
    }

    let n = (THREADS * PER_THREAD) as u64;
    assert_eq!(ids.len() as u64, n);
    assert_eq!(ids, (1..=n).collect::<HashSet<_>>());

    // Storage order agrees with id order and timestamp order.
    let all = store.scan(Timestamp::MIN, Timestamp::MAX);
    assert_eq!(all.len() as u64, n);
    assert!(all
        .windows(2)
        .all(|w| w[0].id < w[1].id && w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_concurrent_scans_see_consistent_prefixes() {
    let store = Store::shared(StoreConfig::default());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..2_000u32 {
                store.insert(200 + (i % 300) as u16, "w").unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.scan(Timestamp::MIN, Timestamp::MAX);
                    // Always a gap-free prefix 1..=len.
                    for (i, record) in snapshot.iter().enumerate() {
                        assert_eq!(record.id.0, i as u64 + 1);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.len(), 2_000);
}

#[test]
fn test_per_subscriber_order_under_concurrent_writers() {
    let store = Store::shared(StoreConfig::default());
    let handle = store.subscribe_with(SubscriptionConfig { buffer_size: 10_000 });

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    store.insert(200, "ordered").unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let ids: Vec<_> = handle.drain().iter().map(|r| r.id.0).collect();
    assert_eq!(ids, (1..=2_000).collect::<Vec<_>>());
}
