//! Error types for biometal-tabix

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, TabixError>;

/// Error types that can occur while loading or querying a tabix index
///
/// The enum is `Clone` so that a failed load can report the same error to
/// every caller that asks for its outcome.
#[derive(Debug, Clone, Error)]
pub enum TabixError {
    /// I/O error raised by a blob
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Structurally invalid index (bad magic, inconsistent counts)
    #[error("Invalid index format: {msg}")]
    Format {
        /// Error message
        msg: String,
    },

    /// The byte stream ended before a field was fully read
    #[error("Unexpected end of data while reading {context}")]
    UnexpectedEndOfData {
        /// Field being read when the data ran out
        context: &'static str,
    },

    /// Queried reference sequence is not present in the index
    #[error("Reference '{0}' not found in index")]
    ReferenceNotFound(String),

    /// Index accessed before `load()` completed
    #[error("Index is not loaded")]
    NotLoaded,

    /// Load was cancelled by the caller
    #[error("Index load was cancelled")]
    Cancelled,

    /// A blob or decompressor panicked while the index was loading
    #[error("Index load panicked")]
    LoadPanicked,

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Network error
    #[cfg(feature = "network")]
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP error
    #[cfg(feature = "network")]
    #[error("HTTP error {status}: {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// URL that failed
        url: String,
    },

    /// Network timeout
    #[cfg(feature = "network")]
    #[error("Network timeout after {seconds}s: {url}")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
        /// URL that timed out
        url: String,
    },
}

impl TabixError {
    /// Shorthand for a [`TabixError::Format`] error
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        TabixError::Format { msg: msg.into() }
    }

    /// Whether the error only signals missing data for a reference
    ///
    /// Callers commonly treat this as an empty result rather than a failure.
    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, TabixError::ReferenceNotFound(_))
    }
}

impl From<std::io::Error> for TabixError {
    fn from(err: std::io::Error) -> Self {
        TabixError::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_is_cloneable() {
        let err: TabixError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing.tbi").into();
        let copy = err.clone();
        assert!(copy.to_string().contains("missing.tbi"));
    }

    #[test]
    fn test_reference_not_found_is_recoverable() {
        assert!(TabixError::ReferenceNotFound("chr9".into()).is_reference_not_found());
        assert!(!TabixError::NotLoaded.is_reference_not_found());
    }
}
