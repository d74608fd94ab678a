//! Store Tests
//!
//! These tests verify:
//! - Point reads and writes, batches, ordered scans
//! - Replay of the log on reopen
//! - Recovery from torn and corrupt log tails

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use lanekv::config::SyncStrategy;
use lanekv::storage::{replay, LogWriter, Operation, Store, WriteBatch, RECORD_HEADER_SIZE};
use tempfile::TempDir;

const SYNC: SyncStrategy = SyncStrategy::EveryWrite;

fn open(dir: &Path) -> Store {
    Store::open(dir, SYNC).unwrap()
}

fn log_path(dir: &Path) -> std::path::PathBuf {
    dir.join("store.log")
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("db");

    let store = open(&dir);
    assert!(dir.is_dir());
    assert!(store.is_empty());
    assert_eq!(store.dir(), dir.as_path());
}

#[test]
fn test_put_get() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());

    store.put(b"a", b"1").unwrap();
    assert_eq!(store.get(b"a"), Some(&b"1"[..]));
    assert_eq!(store.get(b"b"), None);
    assert!(store.exists(b"a"));
    assert!(!store.exists(b"b"));
}

#[test]
fn test_put_overwrites() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());

    store.put(b"k", b"old").unwrap();
    store.put(b"k", b"new").unwrap();

    assert_eq!(store.get(b"k"), Some(&b"new"[..]));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());

    store.put(b"k", b"v").unwrap();
    store.delete(b"k").unwrap();
    assert_eq!(store.get(b"k"), None);

    // Deleting a missing key is fine
    store.delete(b"never-written").unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_empty_key_and_value() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());

    store.put(b"", b"").unwrap();
    assert_eq!(store.get(b""), Some(&b""[..]));
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_write_batch() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());
    store.put(b"gone", b"x").unwrap();

    let mut batch = WriteBatch::new();
    batch.put("a", "1").put("b", "2").delete("gone");
    assert_eq!(batch.len(), 3);

    store.write_batch(batch).unwrap();

    assert_eq!(store.get(b"a"), Some(&b"1"[..]));
    assert_eq!(store.get(b"b"), Some(&b"2"[..]));
    assert_eq!(store.get(b"gone"), None);
}

#[test]
fn test_empty_batch_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let mut store = open(temp.path());

    store.write_batch(WriteBatch::new()).unwrap();
    store.sync().unwrap();

    let len = fs::metadata(log_path(temp.path())).unwrap().len();
    assert_eq!(len, 0);
}

#[test]
fn test_batch_is_one_log_record() {
    let temp = TempDir::new().unwrap();
    {
        let mut store = open(temp.path());
        let mut batch = WriteBatch::new();
        for i in 0..10 {
            batch.put(format!("k{}", i), "v");
        }
        store.write_batch(batch).unwrap();
        store.close().unwrap();
    }

    let result = replay(&log_path(temp.path()), |_| {}).unwrap();
    assert_eq!(result.records, 1);
    assert_eq!(result.last_lsn, 1);
}

// =============================================================================
// Scan Tests
// =============================================================================

fn populated(dir: &Path) -> Store {
    let mut store = open(dir);
    for key in ["a", "b", "c", "d", "e"] {
        store.put(key.as_bytes(), key.to_uppercase().as_bytes()).unwrap();
    }
    store
}

#[test]
fn test_range_is_inclusive() {
    let temp = TempDir::new().unwrap();
    let store = populated(temp.path());

    let pairs = store.range(b"b", b"d");
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![&b"b"[..], &b"c"[..], &b"d"[..]]);
    assert_eq!(pairs[0].1, b"B".to_vec());
}

#[test]
fn test_range_bounds_between_keys() {
    let temp = TempDir::new().unwrap();
    let store = populated(temp.path());

    let pairs = store.range(b"bb", b"dd");
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, b"c".to_vec());
    assert_eq!(pairs[1].0, b"d".to_vec());
}

#[test]
fn test_range_reversed_is_empty() {
    let temp = TempDir::new().unwrap();
    let store = populated(temp.path());

    assert!(store.range(b"d", b"b").is_empty());
}

#[test]
fn test_slice() {
    let temp = TempDir::new().unwrap();
    let store = populated(temp.path());

    let pairs = store.slice(b"b", 2);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, b"b".to_vec());
    assert_eq!(pairs[1].0, b"c".to_vec());

    assert_eq!(store.slice(b"d", 100).len(), 2);
    assert!(store.slice(b"a", 0).is_empty());
    assert!(store.slice(b"z", 10).is_empty());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_replays_log() {
    let temp = TempDir::new().unwrap();
    {
        let mut store = open(temp.path());
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.delete(b"a").unwrap();
        store.put(b"c", b"3").unwrap();
        store.close().unwrap();
    }

    let store = open(temp.path());
    assert_eq!(store.get(b"a"), None);
    assert_eq!(store.get(b"b"), Some(&b"2"[..]));
    assert_eq!(store.get(b"c"), Some(&b"3"[..]));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_reopen_continues_lsn() {
    let temp = TempDir::new().unwrap();
    {
        let mut store = open(temp.path());
        store.put(b"a", b"1").unwrap();
        store.close().unwrap();
    }
    {
        let mut store = open(temp.path());
        store.put(b"b", b"2").unwrap();
        store.close().unwrap();
    }

    let result = replay(&log_path(temp.path()), |_| {}).unwrap();
    assert_eq!(result.records, 2);
    assert_eq!(result.last_lsn, 2);
    assert!(!result.truncated);
}

#[test]
fn test_unsynced_batched_strategy_survives_close() {
    let temp = TempDir::new().unwrap();
    {
        let mut store =
            Store::open(temp.path(), SyncStrategy::EveryNEntries { count: 1000 }).unwrap();
        for i in 0..50u32 {
            store.put(&i.to_be_bytes(), b"v").unwrap();
        }
        store.close().unwrap();
    }

    assert_eq!(open(temp.path()).len(), 50);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_torn_tail_is_truncated() {
    let temp = TempDir::new().unwrap();
    {
        let mut store = open(temp.path());
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.close().unwrap();
    }

    let path = log_path(temp.path());
    let intact_len = fs::metadata(&path).unwrap().len();

    // Half a header, as if the process died mid-append
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; RECORD_HEADER_SIZE / 2]).unwrap();
    drop(file);

    let mut store = open(temp.path());
    assert_eq!(store.len(), 2);
    assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);

    // Appends after recovery are readable
    store.put(b"c", b"3").unwrap();
    store.close().unwrap();
    assert_eq!(open(temp.path()).get(b"c"), Some(&b"3"[..]));
}

#[test]
fn test_corrupt_record_stops_replay() {
    let temp = TempDir::new().unwrap();
    {
        let mut store = open(temp.path());
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.close().unwrap();
    }

    let path = log_path(temp.path());
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let mut applied = Vec::new();
    let result = replay(&path, |op| applied.push(op)).unwrap();
    assert_eq!(result.records, 1);
    assert!(result.truncated);
    assert_eq!(
        applied,
        vec![Operation::Put {
            key: b"a".to_vec(),
            value: b"1".to_vec()
        }]
    );

    let store = open(temp.path());
    assert_eq!(store.get(b"a"), Some(&b"1"[..]));
    assert_eq!(store.get(b"b"), None);
}

#[test]
fn test_replay_missing_log() {
    let temp = TempDir::new().unwrap();
    let result = replay(&temp.path().join("absent.log"), |_| {}).unwrap();

    assert_eq!(result.records, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.truncated);
}

#[test]
fn test_log_writer_assigns_lsns() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ops.log");

    let mut writer = LogWriter::open(&path, 41, SYNC).unwrap();
    assert_eq!(writer.next_lsn(), 42);

    let first = writer
        .append(&Operation::Delete { key: b"x".to_vec() })
        .unwrap();
    let second = writer
        .append(&Operation::Batch(vec![Operation::Delete { key: b"y".to_vec() }]))
        .unwrap();

    assert_eq!(first, 42);
    assert_eq!(second, 43);
    assert_eq!(writer.next_lsn(), 44);
}
