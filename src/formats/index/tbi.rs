//! TBI (Tabix) index format support
//!
//! This module implements parsing and querying of Tabix index files (.tbi),
//! which enable fast random access to sorted, tab-delimited, BGZF-compressed
//! genomic files.
//!
//! # Binary Layout
//!
//! After BGZF decompression a TBI index is a little-endian byte stream:
//!
//! ## Header
//! - Magic: "TBI\1" (4 bytes)
//! - n_ref: Number of reference sequences (int32)
//! - format: Preset in the low 16 bits (0=generic, 1=SAM, 2=VCF), 0x10000 = zero-based
//! - col_seq: Column for sequence name (int32, one-based)
//! - col_beg: Column for start position (int32, one-based)
//! - col_end: Column for end position (int32, 0 if absent)
//! - meta: Comment character for header lines (int32)
//! - skip: Number of lines to skip (int32)
//! - l_nm: Length of concatenated sequence names (int32)
//! - names: Sequence names (null-terminated strings)
//!
//! ## Index Data (per reference)
//! - n_bin (int32), then per bin: bin (uint32), n_chunk (int32),
//!   chunks (uint64 begin, uint64 end virtual offsets)
//! - n_intv (int32), then n_intv uint64 linear index offsets (16 Kbp windows)
//!
//! ## Trailer
//! - n_no_coor: Optional count of records without coordinates (uint64)
//!
//! # Example
//!
//! ```no_run
//! use biometal_tabix::formats::index::TbiIndex;
//!
//! # fn main() -> biometal_tabix::Result<()> {
//! let index = TbiIndex::from_path("data.vcf.gz.tbi")?;
//!
//! println!("Format: {}", index.header().format());
//! println!("References: {}", index.references().len());
//!
//! for chunk in index.blocks_for_range("chr1", 1_000_000, 2_000_000)? {
//!     println!("Chunk: {}", chunk);
//! }
//! # Ok(())
//! # }
//! ```

use super::binning::{bins_overlapping, linear_window, METADATA_BIN};
use super::header::{ColumnNumbers, TbiHeader};
use super::virtual_offset::{Chunk, VirtualOffset};
use crate::error::{Result, TabixError};
use crate::formats::index::lazy::{read_index_bytes, CancelHandle, LoadOptions};
use crate::io::bgzf::BgzfDecompressor;
use crate::io::blob::FileBlob;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

/// TBI file format magic string
pub const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// A bin in the hierarchical binning index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbiBin {
    /// Bin number (0-37448)
    pub bin_id: u32,
    /// Chunks of data in this bin, in file order
    pub chunks: Vec<Chunk>,
}

impl TbiBin {
    /// Create a new bin
    pub fn new(bin_id: u32) -> Self {
        TbiBin {
            bin_id,
            chunks: Vec::new(),
        }
    }
}

/// Per-reference statistics stored in the metadata pseudo-bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Virtual offset of the first record on this reference
    pub first_offset: VirtualOffset,
    /// Virtual offset just past the last record on this reference
    pub last_offset: VirtualOffset,
    /// Number of records with coordinates
    pub mapped: u64,
    /// Number of records without coordinates
    pub unmapped: u64,
}

/// Reference sequence index data
#[derive(Debug, Clone)]
pub struct TbiReference {
    name: String,
    bins: HashMap<u32, TbiBin>,
    linear_index: Vec<VirtualOffset>,
    metadata: Option<ReferenceMetadata>,
}

impl TbiReference {
    /// Reference sequence name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bin by id, if the reference has data in it
    pub fn bin(&self, bin_id: u32) -> Option<&TbiBin> {
        self.bins.get(&bin_id)
    }

    /// All bins with data (unordered)
    pub fn bins(&self) -> impl Iterator<Item = &TbiBin> {
        self.bins.values()
    }

    /// Number of bins with data
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Linear index: minimum virtual offset per 16 Kbp window
    pub fn linear_index(&self) -> &[VirtualOffset] {
        &self.linear_index
    }

    /// Statistics from the metadata pseudo-bin, when the indexer wrote one
    pub fn metadata(&self) -> Option<ReferenceMetadata> {
        self.metadata
    }

    /// Pruning threshold for a query starting at `start`.
    ///
    /// Chunks ending before this offset cannot hold a record overlapping the
    /// query's first window. Positions past the indexed windows use the last
    /// entry; an empty linear index disables pruning.
    pub fn min_offset(&self, start: u64) -> VirtualOffset {
        match self.linear_index.len() {
            0 => VirtualOffset::MIN,
            len => self.linear_index[linear_window(start).min(len - 1)],
        }
    }

    /// Merged chunk list covering every record that overlaps `[start, end)`.
    pub fn blocks_for_range(&self, start: u64, end: u64) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = bins_overlapping(start, end)
            .iter()
            .filter_map(|bin_id| self.bins.get(bin_id))
            .flat_map(|bin| bin.chunks.iter().copied())
            .collect();

        let threshold = self.min_offset(start);
        chunks.retain(|chunk| chunk.maxv >= threshold);

        chunks.sort_by_key(|chunk| chunk.minv);
        merge_chunks(chunks)
    }

    /// Smallest chunk start across all bins
    fn first_chunk_offset(&self) -> Option<VirtualOffset> {
        self.bins
            .values()
            .flat_map(|bin| bin.chunks.iter().map(|chunk| chunk.minv))
            .min()
    }
}

/// TBI (Tabix) index
///
/// Provides fast random access to sorted, tab-delimited, BGZF-compressed files.
/// Immutable once parsed; share it freely between threads.
#[derive(Debug, Clone)]
pub struct TbiIndex {
    header: TbiHeader,
    /// Reference sequences, in file order
    references: Vec<TbiReference>,
    /// Reference name to index mapping
    ref_map: HashMap<String, usize>,
    unplaced_count: Option<u64>,
}

impl TbiIndex {
    /// Load a TBI index from a file (BGZF-compressed or already decompressed)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use biometal_tabix::formats::index::TbiIndex;
    ///
    /// # fn main() -> biometal_tabix::Result<()> {
    /// let index = TbiIndex::from_path("data.vcf.gz.tbi")?;
    /// println!("Loaded {} references", index.references().len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let blob = FileBlob::open(path)?;
        let data = read_index_bytes(
            &blob,
            &BgzfDecompressor,
            &LoadOptions::default(),
            &CancelHandle::new(),
        )?;
        Self::parse(&data)
    }

    /// Parse a fully decompressed TBI byte stream
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut data = bytes;

        let magic = take(&mut data, TBI_MAGIC.len(), "magic")?;
        if magic != TBI_MAGIC {
            return Err(TabixError::format(format!(
                "Invalid TBI magic: expected {:?}, got {:?}",
                TBI_MAGIC, magic
            )));
        }

        let n_ref = read_count(&mut data, "reference count")?;
        let format_flags = read_i32(&mut data, "format flags")?;
        let columns = ColumnNumbers {
            reference: read_i32(&mut data, "sequence column")?,
            start: read_i32(&mut data, "start column")?,
            end: read_i32(&mut data, "end column")?,
        };
        let meta = read_i32(&mut data, "comment character")?;
        let meta_char = u8::try_from(meta).map(char::from).map_err(|_| {
            TabixError::format(format!(
                "Comment character code {} does not fit in one byte",
                meta
            ))
        })?;
        let skip_lines = read_i32(&mut data, "skip line count")?;
        let l_nm = read_count(&mut data, "name block length")?;
        let names = parse_sequence_names(take(&mut data, l_nm, "sequence names")?)?;

        if names.len() != n_ref {
            return Err(TabixError::format(format!(
                "TBI header claims {} references but got {} names",
                n_ref,
                names.len()
            )));
        }

        let mut references = Vec::with_capacity(n_ref);
        let mut ref_map = HashMap::with_capacity(n_ref);

        for (idx, name) in names.iter().enumerate() {
            if ref_map.insert(name.clone(), idx).is_some() {
                return Err(TabixError::format(format!(
                    "Duplicate reference name '{}' in TBI header",
                    name
                )));
            }
            references.push(parse_reference(&mut data, name.clone())?);
        }

        let unplaced_count = match data.len() {
            0 => None,
            _ => Some(read_u64(&mut data, "unplaced record count")?),
        };

        Ok(TbiIndex {
            header: TbiHeader {
                format_flags,
                columns,
                meta_char,
                skip_lines,
                sequence_names: names,
            },
            references,
            ref_map,
            unplaced_count,
        })
    }

    /// Parsed header
    pub fn header(&self) -> &TbiHeader {
        &self.header
    }

    /// Column numbers exactly as encoded
    pub fn column_numbers(&self) -> ColumnNumbers {
        self.header.column_numbers()
    }

    /// Reference sequence names in file order
    pub fn sequence_names(&self) -> &[String] {
        self.header.sequence_names()
    }

    /// Get all references
    pub fn references(&self) -> &[TbiReference] {
        &self.references
    }

    /// Get reference by name
    pub fn reference(&self, name: &str) -> Option<&TbiReference> {
        self.ref_map.get(name).map(|&idx| &self.references[idx])
    }

    /// Whether the index has an entry for `name`
    pub fn has_reference(&self, name: &str) -> bool {
        self.ref_map.contains_key(name)
    }

    /// Count of records without coordinates, if recorded
    pub fn unplaced_count(&self) -> Option<u64> {
        self.unplaced_count
    }

    /// Virtual offset of the first data record (just past the header lines)
    pub fn first_data_offset(&self) -> Option<VirtualOffset> {
        self.references
            .iter()
            .filter_map(TbiReference::first_chunk_offset)
            .min()
    }

    /// Resolve an interval to the chunks that must be read
    ///
    /// Returns chunks sorted by start offset and merged so that no two
    /// consecutive entries could share a decompression pass. Records outside
    /// the interval may be included; none inside it are missed.
    ///
    /// # Arguments
    ///
    /// * `ref_name` - Reference sequence name
    /// * `start` - Start position (0-based, inclusive)
    /// * `end` - End position (0-based, exclusive)
    ///
    /// # Errors
    ///
    /// [`TabixError::ReferenceNotFound`] when the index has no such reference.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use biometal_tabix::formats::index::TbiIndex;
    ///
    /// # fn main() -> biometal_tabix::Result<()> {
    /// let index = TbiIndex::from_path("data.vcf.gz.tbi")?;
    /// let chunks = index.blocks_for_range("chr1", 1000000, 2000000)?;
    /// println!("Need to read {} chunks", chunks.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn blocks_for_range(&self, ref_name: &str, start: u64, end: u64) -> Result<Vec<Chunk>> {
        let reference = self
            .reference(ref_name)
            .ok_or_else(|| TabixError::ReferenceNotFound(ref_name.to_string()))?;

        let chunks = reference.blocks_for_range(start, end);
        tracing::trace!(
            reference = ref_name,
            start,
            end,
            chunks = chunks.len(),
            "tbi::blocks_for_range"
        );
        Ok(chunks)
    }
}

fn parse_reference(data: &mut &[u8], name: String) -> Result<TbiReference> {
    let n_bin = read_count(data, "bin count")?;
    let mut bins: HashMap<u32, TbiBin> = HashMap::with_capacity(n_bin.min(data.len() / 8));
    let mut metadata = None;

    for _ in 0..n_bin {
        let bin_id = read_u32(data, "bin id")?;
        let n_chunk = read_count(data, "chunk count")?;

        let mut chunks = Vec::with_capacity(n_chunk.min(data.len() / 16));
        for _ in 0..n_chunk {
            let minv = VirtualOffset::decode(read_u64(data, "chunk start")?);
            let maxv = VirtualOffset::decode(read_u64(data, "chunk end")?);
            chunks.push(Chunk::new(minv, maxv));
        }

        if bin_id == METADATA_BIN && chunks.len() == 2 {
            metadata = Some(ReferenceMetadata {
                first_offset: chunks[0].minv,
                last_offset: chunks[0].maxv,
                mapped: chunks[1].minv.encode(),
                unmapped: chunks[1].maxv.encode(),
            });
            continue;
        }

        match bins.entry(bin_id) {
            Entry::Occupied(mut existing) => existing.get_mut().chunks.extend(chunks),
            Entry::Vacant(slot) => {
                slot.insert(TbiBin { bin_id, chunks });
            }
        }
    }

    let n_intv = read_count(data, "linear index length")?;
    let mut linear_index = Vec::with_capacity(n_intv.min(data.len() / 8));
    for _ in 0..n_intv {
        linear_index.push(VirtualOffset::decode(read_u64(
            data,
            "linear index entry",
        )?));
    }

    Ok(TbiReference {
        name,
        bins,
        linear_index,
        metadata,
    })
}

/// Merge sorted chunks whose spans share a compressed block.
///
/// A chunk starting in a block at or before the block where the current run
/// ends joins the run; one starting in a later block opens a new run.
pub(crate) fn merge_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if chunk.minv.block_offset() <= current.maxv.block_offset() => {
                current.maxv = current.maxv.max(chunk.maxv);
            }
            _ => merged.push(chunk),
        }
    }

    merged
}

/// Parse null-terminated sequence names from buffer
fn parse_sequence_names(buf: &[u8]) -> Result<Vec<String>> {
    buf.split(|&byte| byte == 0)
        .filter(|name| !name.is_empty())
        .map(|name| {
            std::str::from_utf8(name)
                .map(str::to_string)
                .map_err(|e| TabixError::format(format!("Invalid UTF-8 in sequence name: {}", e)))
        })
        .collect()
}

// Helper functions for reading binary data (little-endian)

fn take<'a>(data: &mut &'a [u8], len: usize, context: &'static str) -> Result<&'a [u8]> {
    if data.len() < len {
        return Err(TabixError::UnexpectedEndOfData { context });
    }
    let (head, tail) = data.split_at(len);
    *data = tail;
    Ok(head)
}

fn read_i32(data: &mut &[u8], context: &'static str) -> Result<i32> {
    let b = take(data, 4, context)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u32(data: &mut &[u8], context: &'static str) -> Result<u32> {
    let b = take(data, 4, context)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(data: &mut &[u8], context: &'static str) -> Result<u64> {
    let b = take(data, 8, context)?;
    Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
}

/// Read an int32 count; negative values are structurally invalid
fn read_count(data: &mut &[u8], context: &'static str) -> Result<usize> {
    let value = read_i32(data, context)?;
    usize::try_from(value)
        .map_err(|_| TabixError::format(format!("Negative {}: {}", context, value)))
}
