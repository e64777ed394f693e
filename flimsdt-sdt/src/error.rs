//! SDT-specific error types.

use thiserror::Error;

/// Result type for SDT operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SDT-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Header magic, checksum or dimension fields are inconsistent.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A block chain ended or ran past the declared block count.
    #[error("block chain traversal failed at hop {hop} (offset {offset}): {reason}")]
    ChainTraversal {
        hop: usize,
        offset: u64,
        reason: String,
    },

    /// The block layout or sample format has no defined decoding.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// The byte source ended before a read completed.
    #[error("truncated read at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// A compressed block payload could not be unpacked.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Plane index outside the file's planes.
    #[error("plane index {index} out of range (plane count {count})")]
    InvalidPlane { index: usize, count: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] flimsdt_core::Error),
}
