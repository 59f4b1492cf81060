//! BGZF block decompression
//!
//! # BGZF Format
//!
//! BGZF is a variant of gzip made of independent gzip members ("blocks"),
//! each decompressing to at most 64 KB. That is what makes virtual offsets
//! work: a reader can start decompressing at any block boundary.
//!
//! # Block Structure
//!
//! Each bgzip block:
//! - Bytes 0-1: Gzip magic (31, 139)
//! - Bytes 2-9: Standard gzip header fields (FLG must have FEXTRA)
//! - Bytes 10-11: XLEN (extra field length)
//! - Bytes 12+: Extra subfields, including BSIZE
//!   - SI1=66 ('B'), SI2=67 ('C') for bgzip
//!   - SLEN=2 (2-byte BSIZE field)
//!   - BSIZE (little-endian u16): total block size - 1
//!
//! The stream ends with an empty 28-byte EOF block.

use crate::error::{Result, TabixError};
use crate::io::blob::Blob;
use flate2::read::GzDecoder;
use std::io::Read;

/// Gzip member magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest possible compressed block (BSIZE is a u16 holding size - 1)
pub const MAX_BLOCK_SIZE: usize = 64 * 1024;

/// Fixed gzip header prefix before the extra subfields
const GZIP_FIXED_HEADER: usize = 12;

/// Smallest valid block: 12-byte header, 6-byte BC subfield, empty deflate
/// stream, CRC32 and ISIZE
const MIN_BLOCK_SIZE: usize = 28;

/// One decompressed block and how much compressed input it used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressedBlock {
    /// Decompressed contents
    pub data: Vec<u8>,
    /// Byte length of the compressed block; the next block starts here
    pub compressed_len: u64,
}

/// Decompresses one block of a block-compressed stream
pub trait BlockDecompressor: Send + Sync {
    /// Decompress the block starting at `offset` in `blob`.
    ///
    /// Returns `None` at end of stream (no bytes left at `offset`).
    fn decompress_block(&self, blob: &dyn Blob, offset: u64) -> Result<Option<DecompressedBlock>>;
}

/// BGZF block decompressor backed by flate2
#[derive(Debug, Clone, Copy, Default)]
pub struct BgzfDecompressor;

impl BlockDecompressor for BgzfDecompressor {
    fn decompress_block(&self, blob: &dyn Blob, offset: u64) -> Result<Option<DecompressedBlock>> {
        // A block never exceeds MAX_BLOCK_SIZE, so one read covers it.
        let bytes = blob.read(offset, MAX_BLOCK_SIZE)?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let size = block_size(&bytes, offset)?;
        if size > bytes.len() {
            return Err(TabixError::Compression(format!(
                "Block size {} at offset {} exceeds remaining data ({} bytes)",
                size,
                offset,
                bytes.len()
            )));
        }

        let data = inflate_block(&bytes[..size], offset)?;
        Ok(Some(DecompressedBlock {
            data,
            compressed_len: size as u64,
        }))
    }
}

/// Total compressed size of the block at the start of `data`, from its BSIZE field
pub fn block_size(data: &[u8], offset: u64) -> Result<usize> {
    if data.len() < GZIP_FIXED_HEADER {
        return Err(TabixError::Compression(format!(
            "Incomplete gzip header at offset {} (only {} bytes remaining)",
            offset,
            data.len()
        )));
    }

    if data[..2] != GZIP_MAGIC {
        return Err(TabixError::Compression(format!(
            "Invalid gzip magic bytes at offset {}: expected [31, 139], got [{}, {}]",
            offset, data[0], data[1]
        )));
    }

    // FEXTRA carries the BSIZE subfield
    if data[3] & 0x04 == 0 {
        return Err(TabixError::Compression(format!(
            "Gzip member at offset {} has no extra field; not a BGZF block",
            offset
        )));
    }

    let xlen = u16::from_le_bytes([data[10], data[11]]) as usize;
    let extra_end = GZIP_FIXED_HEADER + xlen;
    if extra_end > data.len() {
        return Err(TabixError::Compression(format!(
            "Extra field extends beyond data at offset {}",
            offset
        )));
    }

    let mut pos = GZIP_FIXED_HEADER;
    while pos + 4 <= extra_end {
        let (si1, si2) = (data[pos], data[pos + 1]);
        let slen = u16::from_le_bytes([data[pos + 2], data[pos + 3]]) as usize;

        if si1 == b'B' && si2 == b'C' && slen == 2 {
            if pos + 6 > extra_end {
                return Err(TabixError::Compression(format!(
                    "BSIZE field incomplete at offset {}",
                    offset
                )));
            }
            let bsize = u16::from_le_bytes([data[pos + 4], data[pos + 5]]) as usize;
            let size = bsize + 1;
            if size < MIN_BLOCK_SIZE {
                return Err(TabixError::Compression(format!(
                    "Block size {} at offset {} is smaller than a BGZF header",
                    size, offset
                )));
            }
            return Ok(size);
        }

        pos += 4 + slen;
    }

    Err(TabixError::Compression(format!(
        "No BGZF BSIZE subfield in block at offset {}",
        offset
    )))
}

/// Inflate one complete gzip member; CRC32 and ISIZE are verified by flate2
fn inflate_block(block: &[u8], offset: u64) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(block);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).map_err(|e| {
        TabixError::Compression(format!("Failed to inflate block at offset {}: {}", offset, e))
    })?;
    Ok(decompressed)
}
