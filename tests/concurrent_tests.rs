// Concurrent Access Tests for constdb
// These tests share one reader across threads

use constdb::{Reader, SeekReader};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const NUM_KEYS: usize = 2000;

fn build(path: &Path) {
    let mut writer = constdb::create(path).unwrap();
    for i in 0..NUM_KEYS {
        let key = format!("read_key_{}", i);
        let value = format!("read_value_{}", i);
        writer.put(key.as_bytes(), value.as_bytes()).unwrap();
    }
    writer.close().unwrap();
}

/// Test concurrent reads from multiple threads through positioned file reads
#[test]
fn test_concurrent_reads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.cdb");
    build(&path);

    let reader = Arc::new(constdb::open(&path).unwrap());
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let reader = Arc::clone(&reader);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in (thread_id..NUM_KEYS).step_by(3) {
                    let key = format!("read_key_{}", i);
                    let expected = format!("read_value_{}", i);
                    let value = reader.get(key.as_bytes()).unwrap();
                    assert_eq!(value.as_deref(), Some(expected.as_bytes()));
                }
                for i in 0..100 {
                    let key = format!("absent_{}_{}", thread_id, i);
                    assert_eq!(reader.get(key.as_bytes()).unwrap(), None);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Readers over a lock-guarded seekable medium are also shareable
#[test]
fn test_concurrent_reads_through_seek_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seek.cdb");
    build(&path);

    let medium = SeekReader::new(File::open(&path).unwrap());
    let reader = Arc::new(Reader::new(medium).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let reader = Arc::clone(&reader);
            thread::spawn(move || {
                for i in (thread_id..NUM_KEYS).step_by(4) {
                    let key = format!("read_key_{}", i);
                    let expected = format!("read_value_{}", i);
                    assert_eq!(
                        reader.get(key.as_bytes()).unwrap().as_deref(),
                        Some(expected.as_bytes())
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Iteration and lookups can run side by side
#[test]
fn test_concurrent_iteration_and_lookup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iter.cdb");
    build(&path);

    let reader = Arc::new(constdb::open(&path).unwrap());

    let scanner = {
        let reader = Arc::clone(&reader);
        thread::spawn(move || reader.iter().map(|r| r.unwrap()).count())
    };
    let looker = {
        let reader = Arc::clone(&reader);
        thread::spawn(move || {
            (0..NUM_KEYS)
                .filter(|i| reader.contains_key(format!("read_key_{}", i).as_bytes()).unwrap())
                .count()
        })
    };

    assert_eq!(scanner.join().unwrap(), NUM_KEYS);
    assert_eq!(looker.join().unwrap(), NUM_KEYS);
}
