use std::fs::OpenOptions;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use tempfile::tempdir;

use super::PayloadQueue;
use super::QueueFile;
use crate::Error;
use crate::StorageError;

const LIMIT: usize = 32_000;

fn record(n: u8, len: usize) -> Vec<u8> {
    vec![n; len]
}

#[test]
fn test_append_peek_remove_fifo() {
    let dir = tempdir().unwrap();
    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();

    queue.append(&record(1, 10)).unwrap();
    queue.append(&record(2, 20)).unwrap();
    queue.append(&record(3, 30)).unwrap();
    assert_eq!(queue.size(), 3);

    let peeked = queue.peek(2).unwrap();
    assert_eq!(peeked, vec![record(1, 10), record(2, 20)]);
    // Peek does not remove.
    assert_eq!(queue.size(), 3);

    queue.remove_front(2).unwrap();
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.peek(5).unwrap(), vec![record(3, 30)]);
}

#[test]
fn test_reopen_preserves_contents() {
    let dir = tempdir().unwrap();
    {
        let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
        queue.append(&record(1, 8)).unwrap();
        queue.append(&record(2, 8)).unwrap();
        queue.remove_front(1).unwrap();
        queue.close().unwrap();
    }

    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.peek(1).unwrap(), vec![record(2, 8)]);
}

#[test]
fn test_record_too_large_rejected() {
    let dir = tempdir().unwrap();
    let mut queue = QueueFile::create(dir.path(), "q", 16).unwrap();

    let err = queue.append(&record(1, 17)).unwrap_err();
    assert!(matches!(
        err,
        Error::Storage(StorageError::RecordTooLarge { size: 17, limit: 16 })
    ));
    assert_eq!(queue.size(), 0);
}

#[test]
fn test_remove_more_than_available_fails() {
    let dir = tempdir().unwrap();
    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    queue.append(&record(1, 4)).unwrap();

    assert!(queue.remove_front(2).is_err());
    // Failed removal must leave the queue untouched.
    assert_eq!(queue.size(), 1);
}

#[test]
fn test_corrupt_file_recreated_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");
    std::fs::write(&path, b"not a queue file at all").unwrap();

    let queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    assert_eq!(queue.size(), 0);
}

#[test]
fn test_interrupted_append_truncated_on_open() {
    let dir = tempdir().unwrap();
    {
        let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
        queue.append(&record(1, 8)).unwrap();
        queue.close().unwrap();
    }

    // Simulate a crash mid-append: record bytes hit the disk but the header
    // was never rewritten.
    {
        let mut file = OpenOptions::new().write(true).open(dir.path().join("q")).unwrap();
        file.seek(SeekFrom::End(0)).unwrap();
        file.write_all(&[0, 0, 0, 4, 9, 9]).unwrap();
    }

    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.peek(1).unwrap(), vec![record(1, 8)]);
    // The queue keeps working after truncation.
    queue.append(&record(2, 8)).unwrap();
    assert_eq!(queue.size(), 2);
}

#[test]
fn test_drain_reclaims_file_space() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");
    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();

    for i in 0..10 {
        queue.append(&record(i, 1000)).unwrap();
    }
    let grown = std::fs::metadata(&path).unwrap().len();
    assert!(grown > 10_000);

    queue.remove_front(10).unwrap();
    let drained = std::fs::metadata(&path).unwrap().len();
    assert!(drained < 100);
    assert_eq!(queue.size(), 0);
}

#[test]
fn test_for_each_early_stop() {
    let dir = tempdir().unwrap();
    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    for i in 0..5 {
        queue.append(&record(i, 4)).unwrap();
    }

    let mut seen = Vec::new();
    let visited = queue
        .for_each(&mut |bytes| {
            if bytes[0] == 3 {
                return Ok(false);
            }
            seen.push(bytes[0]);
            Ok(true)
        })
        .unwrap();

    assert_eq!(visited, 3);
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_append_after_close_fails() {
    let dir = tempdir().unwrap();
    let mut queue = QueueFile::create(dir.path(), "q", LIMIT).unwrap();
    queue.close().unwrap();

    assert!(matches!(
        queue.append(&record(1, 4)).unwrap_err(),
        Error::Storage(StorageError::QueueClosed)
    ));
}
