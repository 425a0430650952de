//! Recovery: reopening segment directories and replaying the change log.

use std::collections::BTreeSet;
use std::fs;
use windb_core::changelog::read_records;
use windb_core::key::to_binary_key;
use windb_core::{RecoveryStats, SequenceNumber};
use windb_testkit::prelude::*;

fn logged(name: &str) -> WindowStoreConfig {
    test_config(name).logging_enabled(true)
}

#[test]
fn memory_store_is_rebuilt_from_change_log() {
    init_tracing();
    let mut store: TestStore<str, i64> = TestStore::memory(logged("restore"));
    store.put_with_timestamp("a", &1, 1_000).unwrap();
    store.put_with_timestamp("b", &2, 61_000).unwrap();
    store.put_with_timestamp("a", &3, 62_000).unwrap();

    let store = store.reopen();
    assert_eq!(fetch_all(&store, "a", 0, 120_000), vec![(1_000, 1), (62_000, 3)]);
    assert_eq!(fetch_all(&store, "b", 0, 120_000), vec![(61_000, 2)]);
    assert_eq!(store.current_segment_id(), Some(1));
}

#[test]
fn replay_is_idempotent() {
    let mut store: TestStore<str, i64> = TestStore::file(logged("idempotent"));
    store.put_with_timestamp("a", &1, 1_000).unwrap();
    store.put_with_timestamp("a", &2, 61_000).unwrap();
    store.put_with_timestamp("a", &3, 61_000).unwrap();

    // segments come back from disk and the log is replayed over them
    let store = store.reopen();
    let once = fetch_all(&store, "a", 0, 120_000);
    let store = store.reopen();
    let twice = fetch_all(&store, "a", 0, 120_000);

    assert_eq!(once, vec![(1_000, 1), (61_000, 3)]);
    assert_eq!(once, twice);
}

#[test]
fn put_internal_twice_equals_once() {
    let mut store: TestStore<str, i64> = TestStore::memory(test_config("internal"));
    let records = [
        (to_binary_key(b"k", 10, SequenceNumber::ZERO), 1i64),
        (to_binary_key(b"k", 70_000, SequenceNumber::ZERO), 2),
        (to_binary_key(b"k", 10, SequenceNumber::ZERO), 3),
    ];
    for _ in 0..2 {
        for (key, value) in &records {
            store.put_internal(key, &value.to_be_bytes()).unwrap();
        }
        assert_eq!(fetch_all(&store, "k", 0, 120_000), vec![(10, 3), (70_000, 2)]);
    }
}

#[test]
fn change_log_flushes_past_threshold() {
    let mut store: TestStore<str, i64> =
        TestStore::memory(logged("threshold").change_log_max_dirty(2));
    let path = store.context.change_log_path("threshold");

    store.put_with_timestamp("a", &1, 0).unwrap();
    store.put_with_timestamp("b", &1, 0).unwrap();
    assert!(read_records(&path).unwrap().is_empty());

    store.put_with_timestamp("c", &1, 0).unwrap();
    assert_eq!(read_records(&path).unwrap().len(), 3);
}

#[test]
fn change_log_sends_latest_value_once() {
    let mut store: TestStore<str, i64> = TestStore::memory(logged("latest"));
    let path = store.context.change_log_path("latest");
    store.put_with_timestamp("a", &1, 0).unwrap();
    store.put_with_timestamp("a", &2, 0).unwrap();
    store.flush().unwrap();

    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, 2i64.to_be_bytes());
}

#[test]
fn change_log_skips_evicted_records() {
    let mut store: TestStore<str, i64> = TestStore::memory(logged("evicted"));
    let path = store.context.change_log_path("evicted");
    store.put_with_timestamp("a", &1, 0).unwrap();
    store.put_with_timestamp("a", &2, 300_000).unwrap();
    store.flush().unwrap();

    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, to_binary_key(b"a", 300_000, SequenceNumber::ZERO));
}

#[test]
fn sequence_numbers_continue_after_restore() {
    let mut store: TestStore<str, i64> =
        TestStore::memory(logged("seq").retain_duplicates(true));
    store.put_with_timestamp("k", &1, 5).unwrap();
    store.put_with_timestamp("k", &2, 5).unwrap();

    let mut store = store.reopen();
    store.put_with_timestamp("k", &3, 5).unwrap();
    assert_eq!(fetch_all(&store, "k", 5, 5), vec![(5, 1), (5, 2), (5, 3)]);
}

#[test]
fn sequence_numbers_continue_after_segment_reopen() {
    let mut store: TestStore<str, i64> =
        TestStore::file(test_config("seq-file").retain_duplicates(true));
    store.put_with_timestamp("k", &1, 5).unwrap();
    store.put_with_timestamp("other", &7, 65_000).unwrap();

    let mut store = store.reopen();
    store.put_with_timestamp("k", &2, 5).unwrap();
    assert_eq!(fetch_all(&store, "k", 5, 5), vec![(5, 1), (5, 2)]);
    assert_eq!(fetch_all(&store, "other", 65_000, 65_000), vec![(65_000, 7)]);
}

#[test]
fn file_segments_are_reopened() {
    let mut store: TestStore<str, i64> = TestStore::file(test_config("reopen"));
    for minute in 0..3 {
        store.put_with_timestamp("k", &minute, minute * 60_000).unwrap();
    }

    let store = store.reopen();
    assert_eq!(
        store.recovery_stats(),
        RecoveryStats {
            opened: 3,
            skipped: 0,
            expired_removed: 0,
        }
    );
    assert_eq!(store.segment_ids(), BTreeSet::from([0, 1, 2]));
    assert_eq!(store.current_segment_id(), Some(2));
    assert_eq!(
        fetch_all(&store, "k", 0, 180_000),
        vec![(0, 0), (60_000, 1), (120_000, 2)]
    );
}

#[test]
fn recovery_skips_foreign_entries_and_prunes_expired() {
    let mut store: TestStore<str, i64> = TestStore::file(test_config("prune"));
    for minute in 0..3 {
        store.put_with_timestamp("k", &minute, minute * 60_000).unwrap();
    }
    let root = store.root_dir();
    let newer = store.segment_name(10).unwrap();
    let oldest = store.segment_name(0).unwrap();
    fs::create_dir(root.join(&newer)).unwrap();
    fs::create_dir(root.join("tmp")).unwrap();
    fs::write(root.join("notes.txt"), b"not a segment").unwrap();

    let store = store.reopen();
    assert_eq!(
        store.recovery_stats(),
        RecoveryStats {
            opened: 1,
            skipped: 2,
            expired_removed: 3,
        }
    );
    assert_eq!(store.segment_ids(), BTreeSet::from([10]));
    assert!(!root.join(oldest).exists());
    assert!(fetch_all(&store, "k", 0, 180_000).is_empty());
}

#[test]
fn writes_after_recovery_respect_recovered_window() {
    let mut store: TestStore<str, i64> = TestStore::file(test_config("window"));
    store.put_with_timestamp("k", &1, 600_000).unwrap();

    let mut store = store.reopen();
    store.put_with_timestamp("k", &2, 0).unwrap();
    assert_eq!(store.segment_ids(), BTreeSet::from([10]));
    assert_eq!(fetch_all(&store, "k", 0, 600_000), vec![(600_000, 1)]);
}
