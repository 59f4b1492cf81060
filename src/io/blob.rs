//! Byte-range access to an underlying file.
//!
//! A [`Blob`] answers "give me `length` bytes at `offset`". Index loading
//! only ever talks to this trait, so the same code reads local files, memory
//! and (with the `network` feature) HTTP range requests.

use crate::error::Result;
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Random-access byte source
pub trait Blob: Send + Sync {
    /// Read up to `length` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only at the end of the blob, and an empty buffer
    /// when `offset` is at or past the end.
    fn read(&self, offset: u64, length: usize) -> Result<Bytes>;

    /// Total size in bytes, when it is cheap to know
    fn size(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

impl<B: Blob + ?Sized> Blob for Arc<B> {
    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        (**self).read(offset, length)
    }

    fn size(&self) -> Result<Option<u64>> {
        (**self).size()
    }
}

impl<B: Blob + ?Sized> Blob for Box<B> {
    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        (**self).read(offset, length)
    }

    fn size(&self) -> Result<Option<u64>> {
        (**self).size()
    }
}

/// Blob over bytes already in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBlob {
    data: Bytes,
}

impl MemoryBlob {
    /// Wrap a buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        MemoryBlob { data: data.into() }
    }
}

impl Blob for MemoryBlob {
    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        let len = self.data.len();
        let start = usize::try_from(offset).map_or(len, |offset| offset.min(len));
        let end = start.saturating_add(length).min(len);
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> Result<Option<u64>> {
        Ok(Some(self.data.len() as u64))
    }
}

/// Blob over a local file
///
/// Reads seek a shared handle, so concurrent reads are serialized.
#[derive(Debug)]
pub struct FileBlob {
    path: PathBuf,
    file: Mutex<File>,
    len: u64,
}

impl FileBlob {
    /// Open a file for range reads
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(FileBlob {
            path,
            file: Mutex::new(file),
            len,
        })
    }

    /// Path the blob was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Blob for FileBlob {
    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        if offset >= self.len {
            return Ok(Bytes::new());
        }
        let wanted = (self.len - offset).min(length as u64);

        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(wanted as usize);
        (&mut *file).take(wanted).read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> Result<Option<u64>> {
        Ok(Some(self.len))
    }
}
