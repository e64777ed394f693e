//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// SDT parsing or decoding error.
    #[error(transparent)]
    Sdt(#[from] flimsdt_sdt::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] flimsdt_core::Error),

    /// Reader configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}
