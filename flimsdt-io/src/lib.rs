//! flimsdt-io: Memory-mapped SDT file access for flimsdt.
//!
//! [`SdtFileReader`] maps a file, parses its header once and decodes
//! plane regions on demand, optionally merging histograms into intensity
//! and reading several planes in parallel. [`PlaneWriter`] exports decoded
//! regions as raw bytes or CSV.
//!

mod config;
mod error;
mod reader;
mod writer;

pub use config::ReaderConfig;
pub use error::{Error, Result};
pub use reader::{MappedFileReader, SdtFileReader};
pub use writer::PlaneWriter;
