//! Minimal storage contract: know the length, read exact bytes at an offset.

use std::fmt::Debug;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use bytes::Bytes;

/// Length and modification time of a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    /// Total length in bytes.
    pub len: u64,
    /// Last modification time, when the storage tracks one.
    pub modification_time: Option<SystemTime>,
}

/// Random access, blocking byte storage an ORC file is read from.
///
/// Reads are the only suspension points of the tail reader. Closing the
/// underlying handle from another thread surfaces as an [`io::Error`] here.
pub trait ByteSource: Debug + Send + Sync {
    /// Probe the length (and modification time) of the source.
    fn status(&self) -> io::Result<SourceStatus>;

    /// Fill `buf` with the bytes starting at `offset`, or fail.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Read `len` bytes at `offset` into a new buffer.
    fn read_range(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// A file on the local file system.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl LocalFile {
    /// Open the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for LocalFile {
    fn status(&self) -> io::Result<SourceStatus> {
        let metadata = self.file.lock().unwrap().metadata()?;
        Ok(SourceStatus {
            len: metadata.len(),
            modification_time: metadata.modified().ok(),
        })
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// In-memory byte source that records every range it serves.
///
/// Useful for tests and for tails that were fetched by another component.
#[derive(Debug, Default)]
pub struct InMemorySource {
    data: Bytes,
    modification_time: Option<SystemTime>,
    status_count: AtomicUsize,
    access_ranges: Mutex<Vec<Range<u64>>>,
}

impl InMemorySource {
    /// Wrap `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Report `time` as the modification time.
    pub fn with_modification_time(mut self, time: SystemTime) -> Self {
        self.modification_time = Some(time);
        self
    }

    /// Ranges requested through [`ByteSource::read_exact_at`], in call order.
    pub fn access_ranges(&self) -> Vec<Range<u64>> {
        self.access_ranges.lock().unwrap().clone()
    }

    /// Number of [`ByteSource::status`] probes.
    pub fn status_count(&self) -> usize {
        self.status_count.load(Ordering::Relaxed)
    }
}

impl ByteSource for InMemorySource {
    fn status(&self) -> io::Result<SourceStatus> {
        self.status_count.fetch_add(1, Ordering::Relaxed);
        Ok(SourceStatus {
            len: self.data.len() as u64,
            modification_time: self.modification_time,
        })
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = offset..offset + buf.len() as u64;
        if range.end > self.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {range:?} past the end of a {} byte source",
                    self.data.len()
                ),
            ));
        }
        buf.copy_from_slice(&self.data[range.start as usize..range.end as usize]);
        self.access_ranges.lock().unwrap().push(range);
        Ok(())
    }
}
