//! Bioinformatics file format support.
//!
//! - [`index`]: Tabix (.tbi) range index for BGZF-compressed, tab-delimited files

pub mod index;

// Re-export commonly used types
pub use index::{TabixIndex, TbiIndex};
