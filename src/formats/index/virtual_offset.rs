//! BGZF virtual file offsets and the chunks built from them.
//!
//! A virtual offset addresses a byte inside a block-compressed file without
//! decompressing anything before it:
//! - Bits 63-16: Compressed offset of the BGZF block start
//! - Bits 15-0: Offset within that block's decompressed contents

use std::cmp::Ordering;
use std::fmt;

/// Virtual file offset in BGZF format.
///
/// Ordering is lexicographic on `(block_offset, within_block_offset)`, which is
/// the same as ordering the packed 64-bit values.
///
/// # Example
///
/// ```
/// use biometal_tabix::VirtualOffset;
///
/// let offset = VirtualOffset::new(1024, 512);
/// assert_eq!(offset.block_offset(), 1024);
/// assert_eq!(offset.within_block_offset(), 512);
/// assert_eq!(VirtualOffset::decode(offset.encode()), offset);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset {
    // Field order drives the derived ordering.
    block_offset: u64,
    within_block_offset: u16,
}

impl VirtualOffset {
    /// Smallest possible virtual offset (start of file)
    pub const MIN: VirtualOffset = VirtualOffset {
        block_offset: 0,
        within_block_offset: 0,
    };

    /// Largest block offset representable in 48 bits
    pub const MAX_BLOCK_OFFSET: u64 = (1 << 48) - 1;

    /// Create a virtual offset from its two components.
    ///
    /// `block_offset` is truncated to 48 bits, the width available in the
    /// packed form.
    pub fn new(block_offset: u64, within_block_offset: u16) -> Self {
        VirtualOffset {
            block_offset: block_offset & Self::MAX_BLOCK_OFFSET,
            within_block_offset,
        }
    }

    /// Decode a packed 64-bit value. Every input is valid.
    pub fn decode(raw: u64) -> Self {
        VirtualOffset {
            block_offset: raw >> 16,
            within_block_offset: (raw & 0xFFFF) as u16,
        }
    }

    /// Pack into the 64-bit on-disk representation.
    pub fn encode(self) -> u64 {
        (self.block_offset << 16) | u64::from(self.within_block_offset)
    }

    /// Byte position of the compressed block start in the source file.
    pub fn block_offset(self) -> u64 {
        self.block_offset
    }

    /// Byte offset inside the block's decompressed contents.
    pub fn within_block_offset(self) -> u16 {
        self.within_block_offset
    }

    /// Three-way comparison; same as [`Ord::cmp`].
    pub fn compare(&self, other: &VirtualOffset) -> Ordering {
        self.cmp(other)
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        VirtualOffset::decode(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.encode()
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_offset, self.within_block_offset)
    }
}

/// A contiguous span of decompressed records, `[minv, maxv)`.
///
/// Chunks are the unit of retrieval: a caller seeks to `minv.block_offset()`,
/// decompresses, skips `minv.within_block_offset()` bytes and reads records
/// until it passes `maxv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Virtual offset of the first byte in the chunk
    pub minv: VirtualOffset,
    /// Virtual offset just past the chunk
    pub maxv: VirtualOffset,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(minv: VirtualOffset, maxv: VirtualOffset) -> Self {
        Chunk { minv, maxv }
    }

    /// Whether `offset` falls inside `[minv, maxv)`.
    pub fn contains(&self, offset: VirtualOffset) -> bool {
        self.minv <= offset && offset < self.maxv
    }

    /// Whether this chunk covers every offset of `other`.
    pub fn covers(&self, other: &Chunk) -> bool {
        self.minv <= other.minv && other.maxv <= self.maxv
    }

    /// Compressed byte range `[start, end)` a caller must fetch, given the
    /// compressed length of the block `maxv` points into.
    ///
    /// The block containing `maxv` has to be read whole, so its length is
    /// needed to bound the fetch.
    pub fn compressed_range(&self, last_block_len: u64) -> (u64, u64) {
        (
            self.minv.block_offset(),
            self.maxv.block_offset() + last_block_len,
        )
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.minv, self.maxv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_offset_components() {
        let offset = VirtualOffset::new(1024, 512);
        assert_eq!(offset.block_offset(), 1024);
        assert_eq!(offset.within_block_offset(), 512);
        assert_eq!(offset.encode(), (1024 << 16) | 512);
    }

    #[test]
    fn test_decode_splits_high_and_low_bits() {
        let offset = VirtualOffset::decode(0x0001_0203_0405_0607);
        assert_eq!(offset.block_offset(), 0x0001_0203_0405);
        assert_eq!(offset.within_block_offset(), 0x0607);

        let max = VirtualOffset::decode(u64::MAX);
        assert_eq!(max.block_offset(), VirtualOffset::MAX_BLOCK_OFFSET);
        assert_eq!(max.within_block_offset(), u16::MAX);
    }

    #[test]
    fn test_virtual_offset_ordering() {
        let off1 = VirtualOffset::new(1000, 100);
        let off2 = VirtualOffset::new(1000, 200);
        let off3 = VirtualOffset::new(2000, 100);

        assert!(off1 < off2);
        assert!(off2 < off3);
        assert_eq!(off1.compare(&off3), Ordering::Less);
        assert_eq!(off3.compare(&off2), Ordering::Greater);
        assert_eq!(off2.compare(&VirtualOffset::new(1000, 200)), Ordering::Equal);
    }

    #[test]
    fn test_ordering_matches_packed_value() {
        let values = [0u64, 1, 0xFFFF, 0x10000, 0x1_0000_FFFF, u64::MAX];
        for &a in &values {
            for &b in &values {
                assert_eq!(
                    VirtualOffset::decode(a).cmp(&VirtualOffset::decode(b)),
                    a.cmp(&b)
                );
            }
        }
    }

    #[test]
    fn test_chunk_contains_and_covers() {
        let chunk = Chunk::new(VirtualOffset::new(10, 5), VirtualOffset::new(20, 0));
        assert!(chunk.contains(VirtualOffset::new(10, 5)));
        assert!(chunk.contains(VirtualOffset::new(19, 65535)));
        assert!(!chunk.contains(VirtualOffset::new(20, 0)));

        let inner = Chunk::new(VirtualOffset::new(12, 0), VirtualOffset::new(18, 0));
        assert!(chunk.covers(&inner));
        assert!(!inner.covers(&chunk));
    }

    #[test]
    fn test_compressed_range() {
        let chunk = Chunk::new(VirtualOffset::new(100, 7), VirtualOffset::new(900, 3));
        assert_eq!(chunk.compressed_range(250), (100, 1150));
    }

    #[test]
    fn test_display() {
        let chunk = Chunk::new(VirtualOffset::new(0, 10501), VirtualOffset::new(4, 2));
        assert_eq!(chunk.to_string(), "0:10501-4:2");
    }
}
