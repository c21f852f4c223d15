//! Length-prefixed on-disk record store.
//!
//! File layout:
//!
//! ```text
//! [magic u32][count u32][head u64]        16-byte header, big-endian
//! ...dead region before head...
//! [len u32][record bytes] x count         records, head to tail
//! ```
//!
//! Appends write the record first and commit it by rewriting the header, so
//! a crash mid-append leaves trailing garbage past the committed tail, which
//! the next open truncates away. Removal only advances the head offset; the
//! dead region is reclaimed whenever the queue drains to empty.

use std::fs::create_dir_all;
use std::fs::remove_file;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use super::PayloadQueue;
use crate::Result;
use crate::StorageError;

const MAGIC: u32 = 0xBEA6_0001;
const HEADER_LEN: u64 = 16;

pub struct QueueFile {
    path: PathBuf,
    file: File,
    /// Offset of the oldest record.
    head: u64,
    /// Offset one past the newest record.
    tail: u64,
    count: usize,
    max_record_bytes: usize,
    closed: bool,
}

impl QueueFile {
    /// Open the queue file `name` under `dir`. If the existing file is
    /// corrupt it is deleted and recreated empty; only when that also fails
    /// does this return an error.
    pub fn create(
        dir: &Path,
        name: &str,
        max_record_bytes: usize,
    ) -> Result<Self> {
        create_dir_all(dir)?;
        let path = dir.join(name);
        match Self::open(&path, max_record_bytes) {
            Ok(queue) => Ok(queue),
            Err(e) => {
                warn!("Queue file unreadable ({e}), deleting and recreating: {:?}", path);
                remove_file(&path)?;
                Self::open(&path, max_record_bytes)
            }
        }
    }

    fn open(
        path: &Path,
        max_record_bytes: usize,
    ) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        let file_len = file.metadata()?.len();

        if file_len == 0 {
            let mut queue = QueueFile {
                path: path.to_path_buf(),
                file,
                head: HEADER_LEN,
                tail: HEADER_LEN,
                count: 0,
                max_record_bytes,
                closed: false,
            };
            queue.write_header()?;
            queue.file.sync_data()?;
            return Ok(queue);
        }

        if file_len < HEADER_LEN {
            return Err(corruption(path));
        }

        file.seek(SeekFrom::Start(0))?;
        let magic = read_u32(&mut file)?;
        let count = read_u32(&mut file)? as usize;
        let head = read_u64(&mut file)?;
        if magic != MAGIC || head < HEADER_LEN || head > file_len {
            return Err(corruption(path));
        }

        // Walk the committed records to find the tail and validate framing.
        let mut offset = head;
        for _ in 0..count {
            if offset + 4 > file_len {
                return Err(corruption(path));
            }
            file.seek(SeekFrom::Start(offset))?;
            let len = read_u32(&mut file)? as u64;
            if len == 0 || offset + 4 + len > file_len {
                return Err(corruption(path));
            }
            offset += 4 + len;
        }

        // Trailing bytes past the committed tail are an interrupted append.
        if offset < file_len {
            debug!("Truncating {} uncommitted bytes from queue file", file_len - offset);
            file.set_len(offset)?;
        }

        Ok(QueueFile {
            path: path.to_path_buf(),
            file,
            head,
            tail: offset,
            count,
            max_record_bytes,
            closed: false,
        })
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        header[4..8].copy_from_slice(&(self.count as u32).to_be_bytes());
        header[8..16].copy_from_slice(&self.head.to_be_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StorageError::QueueClosed.into());
        }
        Ok(())
    }

    /// Offset just past the record starting at `offset`.
    fn next_offset(
        &mut self,
        offset: u64,
    ) -> Result<u64> {
        self.file.seek(SeekFrom::Start(offset))?;
        let len = read_u32(&mut self.file)? as u64;
        Ok(offset + 4 + len)
    }

    fn read_record_at(
        &mut self,
        offset: u64,
    ) -> Result<(Vec<u8>, u64)> {
        self.file.seek(SeekFrom::Start(offset))?;
        let len = read_u32(&mut self.file)? as usize;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok((buf, offset + 4 + len as u64))
    }
}

impl PayloadQueue for QueueFile {
    fn append(
        &mut self,
        bytes: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        if bytes.len() > self.max_record_bytes {
            return Err(StorageError::RecordTooLarge {
                size: bytes.len(),
                limit: self.max_record_bytes,
            }
            .into());
        }

        self.file.seek(SeekFrom::Start(self.tail))?;
        self.file.write_all(&(bytes.len() as u32).to_be_bytes())?;
        self.file.write_all(bytes)?;

        // Commit point: the record only exists once the header says so.
        self.tail += 4 + bytes.len() as u64;
        self.count += 1;
        self.write_header()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn peek(
        &mut self,
        n: usize,
    ) -> Result<Vec<Vec<u8>>> {
        self.ensure_open()?;
        let n = n.min(self.count);
        let mut records = Vec::with_capacity(n);
        let mut offset = self.head;
        for _ in 0..n {
            let (record, next) = self.read_record_at(offset)?;
            records.push(record);
            offset = next;
        }
        Ok(records)
    }

    fn remove_front(
        &mut self,
        n: usize,
    ) -> Result<()> {
        self.ensure_open()?;
        if n == 0 {
            return Ok(());
        }
        if n > self.count {
            return Err(StorageError::RemoveOutOfRange {
                requested: n,
                available: self.count,
            }
            .into());
        }

        let mut offset = self.head;
        for _ in 0..n {
            offset = self.next_offset(offset)?;
        }

        self.count -= n;
        if self.count == 0 {
            // Drained: reclaim the dead region instead of growing forever.
            self.head = HEADER_LEN;
            self.tail = HEADER_LEN;
            self.write_header()?;
            self.file.set_len(HEADER_LEN)?;
        } else {
            self.head = offset;
            self.write_header()?;
        }
        self.file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> usize {
        self.count
    }

    fn for_each(
        &mut self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<bool>,
    ) -> Result<usize> {
        self.ensure_open()?;
        let mut visited = 0;
        let mut offset = self.head;
        for _ in 0..self.count {
            let (record, next) = self.read_record_at(offset)?;
            if !visitor(&record)? {
                break;
            }
            visited += 1;
            offset = next;
        }
        Ok(visited)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.file.sync_data()?;
        self.closed = true;
        debug!("Queue file closed: {:?}", self.path);
        Ok(())
    }
}

fn corruption(path: &Path) -> crate::Error {
    StorageError::Corruption {
        path: path.to_path_buf(),
    }
    .into()
}

fn read_u32(file: &mut File) -> Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64(file: &mut File) -> Result<u64> {
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}
