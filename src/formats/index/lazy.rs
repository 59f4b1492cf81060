//! Load-once lifecycle for a tabix index backed by a blob.
//!
//! A [`TabixIndex`] starts `Unloaded`. The first [`TabixIndex::load`] call
//! fetches the index bytes, drives the block decompressor to end of stream,
//! parses the result and publishes it:
//!
//! ```text
//! Unloaded --load()--> Loading --ok--> Loaded
//!                         |----error--> Failed   (terminal)
//!                         `--cancel---> Unloaded (may load again)
//! ```
//!
//! # Concurrency
//!
//! - Queries and accessors never block. Before `Loaded` they fail fast with
//!   [`TabixError::NotLoaded`]; afterwards they read the published index
//!   without locking.
//! - A `load()` call made while another thread is loading waits for that load
//!   and returns its outcome.
//! - [`CancelHandle::cancel`] stops the load in flight at its next blob read
//!   or block decompression. Nothing is published.
//! - A blob or decompressor that panics leaves the index `Failed` with
//!   [`TabixError::LoadPanicked`]; threads waiting on that load are released.
//!
//! # Example
//!
//! ```no_run
//! use biometal_tabix::TabixIndex;
//!
//! # fn main() -> biometal_tabix::Result<()> {
//! let index = TabixIndex::from_path("volvox.test.vcf.gz.tbi")?;
//! index.load()?;
//!
//! let columns = index.column_numbers()?;
//! println!("start column: {}", columns.start);
//!
//! for chunk in index.blocks_for_range("ctgA", 1, 4000)? {
//!     println!("{}", chunk);
//! }
//! # Ok(())
//! # }
//! ```

use super::header::{ColumnNumbers, TbiHeader};
use super::tbi::TbiIndex;
use super::virtual_offset::Chunk;
use crate::error::{Result, TabixError};
use crate::io::bgzf::{BgzfDecompressor, BlockDecompressor, GZIP_MAGIC};
use crate::io::blob::{Blob, FileBlob, MemoryBlob};
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};

/// Default length requested per blob read (64 KiB)
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Default ceiling on compressed and decompressed index size (256 MiB)
///
/// Real TBI indexes are a few MiB at most; anything larger is corrupt or not
/// an index.
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 256 * 1024 * 1024;

/// Tunables for acquiring the index bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    read_size: usize,
    max_index_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            read_size: DEFAULT_READ_SIZE,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
        }
    }
}

impl LoadOptions {
    /// Bytes requested per blob read (minimum 1)
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    /// Maximum accepted index size, compressed or decompressed
    pub fn with_max_index_bytes(mut self, max_index_bytes: u64) -> Self {
        self.max_index_bytes = max_index_bytes;
        self
    }

    /// Bytes requested per blob read
    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Maximum accepted index size
    pub fn max_index_bytes(&self) -> u64 {
        self.max_index_bytes
    }
}

/// Lifecycle state of a [`TabixIndex`]
#[derive(Debug, Clone)]
pub enum LoadState {
    /// `load()` has not run, or the last load was cancelled
    Unloaded,
    /// A load is in progress
    Loading,
    /// The index is published and immutable
    Loaded,
    /// The load failed; the instance cannot be reused
    Failed(TabixError),
}

/// Cooperative cancellation for an in-flight load
///
/// Cheap to clone; all clones refer to the same flag. Cancelling when no load
/// is running has no effect on the next load, which clears the flag when it
/// starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a handle that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the load in flight
    ///
    /// The flag is cleared when a load claims the `Loading` state. A cancel
    /// issued before that point, even while another thread is already inside
    /// `load()` waiting for the lifecycle lock, does not stop that load.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TabixError::Cancelled)
        } else {
            Ok(())
        }
    }
}

struct Lifecycle {
    state: LoadState,
    /// Bumped every time a load finishes, so waiters can tell their load apart
    /// from a later one
    generation: u64,
}

/// Tabix index that loads itself once from a blob
pub struct TabixIndex {
    blob: Box<dyn Blob>,
    decompressor: Box<dyn BlockDecompressor>,
    options: LoadOptions,
    lifecycle: Mutex<Lifecycle>,
    finished: Condvar,
    published: OnceLock<Arc<TbiIndex>>,
    cancel: CancelHandle,
}

impl std::fmt::Debug for TabixIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabixIndex")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TabixIndex {
    /// Create an unloaded index over a BGZF-compressed (or raw) index blob
    pub fn new<B: Blob + 'static>(blob: B) -> Self {
        Self::with_decompressor(blob, BgzfDecompressor)
    }

    /// Create an unloaded index with a custom block decompressor
    pub fn with_decompressor<B, D>(blob: B, decompressor: D) -> Self
    where
        B: Blob + 'static,
        D: BlockDecompressor + 'static,
    {
        TabixIndex {
            blob: Box::new(blob),
            decompressor: Box::new(decompressor),
            options: LoadOptions::default(),
            lifecycle: Mutex::new(Lifecycle {
                state: LoadState::Unloaded,
                generation: 0,
            }),
            finished: Condvar::new(),
            published: OnceLock::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Replace the load options (builder style)
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Open an index file; nothing is read until `load()`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(FileBlob::open(path)?))
    }

    /// Wrap index bytes already in memory
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(MemoryBlob::new(data))
    }

    /// Handle that cancels the load in flight
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Snapshot of the lifecycle state
    pub fn state(&self) -> LoadState {
        self.lock().state.clone()
    }

    /// Whether the index is published
    pub fn is_loaded(&self) -> bool {
        self.published.get().is_some()
    }

    /// Fetch, decompress and parse the index, once.
    ///
    /// Idempotent: after `Loaded` this returns `Ok(())`, after `Failed` the
    /// original error. Concurrent callers wait for the load in flight.
    pub fn load(&self) -> Result<()> {
        let mut lifecycle = self.lock();
        loop {
            match lifecycle.state {
                LoadState::Loaded => return Ok(()),
                LoadState::Failed(ref err) => return Err(err.clone()),
                LoadState::Unloaded => break,
                LoadState::Loading => {}
            }

            let generation = lifecycle.generation;
            while matches!(lifecycle.state, LoadState::Loading)
                && lifecycle.generation == generation
            {
                lifecycle = self
                    .finished
                    .wait(lifecycle)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            // The load we waited on was cancelled.
            if matches!(lifecycle.state, LoadState::Unloaded) {
                return Err(TabixError::Cancelled);
            }
        }

        lifecycle.state = LoadState::Loading;
        self.cancel.reset();
        drop(lifecycle);
        let mut guard = LoadGuard {
            index: self,
            armed: true,
        };

        tracing::debug!(read_size = self.options.read_size, "tabix index load started");
        let outcome = read_index_bytes(
            self.blob.as_ref(),
            self.decompressor.as_ref(),
            &self.options,
            &self.cancel,
        )
        .and_then(|data| TbiIndex::parse(&data));

        guard.armed = false;
        let mut lifecycle = self.lock();
        let result = match outcome {
            Ok(index) => {
                tracing::debug!(
                    references = index.references().len(),
                    "tabix index loaded"
                );
                // Only this thread reaches here while Loading, so the cell is empty.
                let _ = self.published.set(Arc::new(index));
                lifecycle.state = LoadState::Loaded;
                Ok(())
            }
            Err(TabixError::Cancelled) => {
                tracing::debug!("tabix index load cancelled");
                lifecycle.state = LoadState::Unloaded;
                Err(TabixError::Cancelled)
            }
            Err(err) => {
                tracing::debug!(error = %err, "tabix index load failed");
                lifecycle.state = LoadState::Failed(err.clone());
                Err(err)
            }
        };
        lifecycle.generation += 1;
        drop(lifecycle);
        self.finished.notify_all();

        result
    }

    /// The published index, shared
    pub fn index(&self) -> Result<Arc<TbiIndex>> {
        self.loaded().map(Arc::clone)
    }

    /// Parsed header
    pub fn header(&self) -> Result<&TbiHeader> {
        self.loaded().map(|index| index.header())
    }

    /// Column numbers exactly as encoded in the index
    pub fn column_numbers(&self) -> Result<ColumnNumbers> {
        self.loaded().map(|index| index.column_numbers())
    }

    /// Reference sequence names in file order
    pub fn sequence_names(&self) -> Result<&[String]> {
        self.loaded().map(|index| index.sequence_names())
    }

    /// Whether the loaded index has an entry for `name`
    pub fn has_reference(&self, name: &str) -> Result<bool> {
        self.loaded().map(|index| index.has_reference(name))
    }

    /// Resolve `[start, end)` on `ref_name` to the chunks that must be read.
    ///
    /// See [`TbiIndex::blocks_for_range`].
    pub fn blocks_for_range(&self, ref_name: &str, start: u64, end: u64) -> Result<Vec<Chunk>> {
        self.loaded()?.blocks_for_range(ref_name, start, end)
    }

    fn loaded(&self) -> Result<&Arc<TbiIndex>> {
        self.published.get().ok_or(TabixError::NotLoaded)
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        // State is only ever replaced whole, so a poisoned guard is still consistent.
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Moves a load that unwound out of `Loading` so waiters are released.
struct LoadGuard<'a> {
    index: &'a TabixIndex,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!("tabix index load panicked");
        let mut lifecycle = self.index.lock();
        lifecycle.state = LoadState::Failed(TabixError::LoadPanicked);
        lifecycle.generation += 1;
        drop(lifecycle);
        self.index.finished.notify_all();
    }
}

/// Read the whole blob, then inflate it block by block if it is BGZF.
///
/// A stream that does not start with the gzip magic is taken as an already
/// decompressed index.
pub(crate) fn read_index_bytes(
    blob: &dyn Blob,
    decompressor: &dyn BlockDecompressor,
    options: &LoadOptions,
    cancel: &CancelHandle,
) -> Result<Vec<u8>> {
    let raw = read_blob(blob, options, cancel)?;
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw.to_vec());
    }

    let compressed = MemoryBlob::new(raw);
    let mut data = Vec::new();
    let mut offset = 0u64;
    let mut blocks = 0usize;

    loop {
        cancel.check()?;
        let Some(block) = decompressor.decompress_block(&compressed, offset)? else {
            break;
        };
        if block.compressed_len == 0 {
            return Err(TabixError::Compression(format!(
                "Decompressor consumed no bytes at offset {}",
                offset
            )));
        }
        data.extend_from_slice(&block.data);
        check_size(data.len() as u64, options, "decompressed")?;
        offset += block.compressed_len;
        blocks += 1;
    }

    tracing::debug!(
        compressed = offset,
        decompressed = data.len(),
        blocks,
        "tabix index inflated"
    );
    Ok(data)
}

fn read_blob(blob: &dyn Blob, options: &LoadOptions, cancel: &CancelHandle) -> Result<Bytes> {
    let size = blob.size()?;
    if let Some(size) = size {
        check_size(size, options, "compressed")?;
    }

    let mut data = Vec::new();
    loop {
        cancel.check()?;
        let offset = data.len() as u64;
        if size.map_or(false, |size| offset >= size) {
            break;
        }
        let chunk = blob.read(offset, options.read_size)?;
        if chunk.is_empty() {
            break;
        }
        data.extend_from_slice(&chunk);
        check_size(data.len() as u64, options, "compressed")?;
        if size.is_none() && chunk.len() < options.read_size {
            break;
        }
    }

    Ok(Bytes::from(data))
}

fn check_size(len: u64, options: &LoadOptions, what: &str) -> Result<()> {
    if len > options.max_index_bytes {
        return Err(TabixError::format(format!(
            "Index exceeds {} bytes ({}): {} bytes",
            options.max_index_bytes, what, len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_options_builders() {
        let options = LoadOptions::default()
            .with_read_size(0)
            .with_max_index_bytes(1024);
        assert_eq!(options.read_size(), 1);
        assert_eq!(options.max_index_bytes(), 1024);
    }

    #[test]
    fn test_accessors_before_load() {
        let index = TabixIndex::from_bytes(Vec::new());
        assert!(matches!(index.state(), LoadState::Unloaded));
        assert!(matches!(index.column_numbers(), Err(TabixError::NotLoaded)));
        assert!(matches!(
            index.blocks_for_range("ctgA", 1, 4000),
            Err(TabixError::NotLoaded)
        ));
    }

    #[test]
    fn test_empty_blob_fails_with_end_of_data() {
        let index = TabixIndex::from_bytes(Vec::new());
        let err = index.load().unwrap_err();
        assert!(matches!(err, TabixError::UnexpectedEndOfData { .. }));
        assert!(matches!(index.state(), LoadState::Failed(_)));
    }

    #[test]
    fn test_raw_stream_is_passed_through() {
        let blob = MemoryBlob::new(b"not gzip".to_vec());
        let data = read_index_bytes(
            &blob,
            &BgzfDecompressor,
            &LoadOptions::default().with_read_size(3),
            &CancelHandle::new(),
        )
        .unwrap();
        assert_eq!(data, b"not gzip");
    }

    #[test]
    fn test_oversized_blob_is_rejected() {
        let blob = MemoryBlob::new(vec![0u8; 100]);
        let err = read_index_bytes(
            &blob,
            &BgzfDecompressor,
            &LoadOptions::default().with_max_index_bytes(10),
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TabixError::Format { .. }));
    }

    #[test]
    fn test_cancel_before_load_is_cleared() {
        let index = TabixIndex::from_bytes(b"TBI\x01".to_vec());
        index.cancel_handle().cancel();
        // Reaches the parser instead of stopping at the first read
        assert!(matches!(
            index.load(),
            Err(TabixError::UnexpectedEndOfData { .. })
        ));
    }

    #[test]
    fn test_cancelled_handle_stops_reading() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let blob = MemoryBlob::new(vec![1u8; 16]);
        let err = read_index_bytes(&blob, &BgzfDecompressor, &LoadOptions::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, TabixError::Cancelled));
    }
}
