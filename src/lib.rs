//! biometal-tabix: range queries over tabix-indexed genomic files
//!
//! # Overview
//!
//! Large VCF/BED/GFF tables are distributed BGZF-compressed with a `.tbi`
//! index next to them. Given a reference name and an interval, this crate
//! returns the minimal ordered set of chunks (virtual offset ranges) that must
//! be fetched and decompressed to see every overlapping record, without
//! touching the rest of the file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use biometal_tabix::TabixIndex;
//!
//! # fn main() -> biometal_tabix::Result<()> {
//! let index = TabixIndex::from_path("variants.vcf.gz.tbi")?;
//! index.load()?;
//!
//! for chunk in index.blocks_for_range("chr1", 1_000_000, 2_000_000)? {
//!     println!("read from block {}", chunk.minv.block_offset());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`formats`]: Index parsing, binning geometry and range resolution
//! - [`io`]: Byte-range blobs and BGZF block decompression
//! - [`error`]: Error type shared by the crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod formats;
pub mod io;

// Re-export commonly used types
pub use error::{Result, TabixError};
pub use formats::index::{
    Chunk, ColumnNumbers, LoadOptions, LoadState, TabixIndex, TbiIndex, VirtualOffset,
};
pub use io::{Blob, BlockDecompressor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
