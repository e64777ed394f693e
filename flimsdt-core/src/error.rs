//! Error types for flimsdt-core.

use thiserror::Error;

/// Result type alias for flimsdt-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for plane geometry, regions and intensity merging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Image or histogram dimensions that cannot describe a plane.
    #[error("invalid dimensions: width={width}, height={height}, time bins={time_bins}")]
    InvalidDimensions {
        width: i64,
        height: i64,
        time_bins: i64,
    },

    /// Requested region does not fit inside the plane.
    #[error("region {x},{y} {width}x{height} exceeds plane bounds {plane_width}x{plane_height}")]
    InvalidRegion {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        plane_width: usize,
        plane_height: usize,
    },

    /// Destination or source buffer has the wrong length.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Sample width the merger does not handle.
    #[error("unsupported sample width: {0} bytes")]
    UnsupportedSampleWidth(usize),

    /// Arithmetic on declared sizes overflowed `usize`.
    #[error("size overflow while computing {0}")]
    SizeOverflow(&'static str),
}
