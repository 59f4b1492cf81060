//! I/O module: byte-range blobs and block decompression
//!
//! These are the two collaborators an index load needs: something that returns
//! bytes for an offset and length ([`Blob`]), and something that turns one
//! compressed block into its contents ([`BlockDecompressor`]).

pub mod bgzf;
pub mod blob;

pub use bgzf::{BgzfDecompressor, BlockDecompressor, DecompressedBlock};
pub use blob::{Blob, FileBlob, MemoryBlob};

// Remote index files over HTTP range requests
#[cfg(feature = "network")]
pub mod network;
#[cfg(feature = "network")]
pub use network::HttpBlob;
