//! Index formats for genomic data files
//!
//! Tabix indexes enable region queries on sorted, tab-delimited,
//! BGZF-compressed genomic files (VCF, BED, GFF3, generic TSV) without
//! decompressing the whole file. A query resolves a reference name and an
//! interval to the ordered list of chunks (virtual offset ranges) holding
//! every overlapping record.
//!
//! # Module Organization
//!
//! - [`virtual_offset`]: BGZF virtual offsets and chunks
//! - [`binning`]: Hierarchical bin geometry
//! - [`header`]: Preset, column layout and comment conventions
//! - [`tbi`]: Index parsing and range resolution
//! - [`lazy`]: Load-once lifecycle over a blob
//!
//! # Example
//!
//! ```no_run
//! use biometal_tabix::formats::index::TabixIndex;
//!
//! # fn main() -> biometal_tabix::Result<()> {
//! let index = TabixIndex::from_path("variants.vcf.gz.tbi")?;
//! index.load()?;
//!
//! let chunks = index.blocks_for_range("chr1", 1000000, 2000000)?;
//! println!("Found {} chunks for region", chunks.len());
//! # Ok(())
//! # }
//! ```

pub mod binning;
pub mod header;
pub mod lazy;
pub mod tbi;
pub mod virtual_offset;

pub use header::{ColumnNumbers, CoordinateSystem, ResolvedColumns, TbiFormat, TbiHeader};
pub use lazy::{CancelHandle, LoadOptions, LoadState, TabixIndex};
pub use tbi::{ReferenceMetadata, TbiBin, TbiIndex, TbiReference};
pub use virtual_offset::{Chunk, VirtualOffset};
