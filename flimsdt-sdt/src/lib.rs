//! flimsdt-sdt: Becker & Hickl SDT header parsing and region decoding.
//!
//! # Key Components
//!
//! - [`HeaderParser`] - reads the file header, measurement description and
//!   first block header into a [`HeaderRecord`]
//! - [`BlockChain`] / [`locate_block`] - bounded walk over linked data blocks
//! - [`BlockLayout`] - standard, chained-per-plane (FIFO) or
//!   chained-per-pixel storage, resolved once per file
//! - [`RegionDecoder`] - reads a rectangular region of one plane
//!
//! # Example
//!
//! ```no_run
//! use flimsdt_core::{PlaneRequest, Region};
//! use flimsdt_sdt::{HeaderParser, RegionDecoder};
//! use std::fs::File;
//!
//! let mut file = File::open("scan.sdt")?;
//! let record = HeaderParser::new().parse(&mut file)?;
//! let region = Region::new(0, 0, record.width, record.height);
//! let plane = RegionDecoder::new(&record).decode(&mut file, &PlaneRequest::new(0, region))?;
//! println!("{} bytes", plane.data.len());
//! # Ok::<(), flimsdt_sdt::Error>(())
//! ```

pub mod block;
pub mod container;
pub mod decoder;
pub mod error;
pub mod header;
pub mod info;
pub mod layout;
pub mod measure;
pub mod parser;
mod stream;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use block::{locate_block, BlockChain, BlockContent, BlockHeader, BlockType, LocatedBlock};
pub use container::{compress_block, decompress_block};
pub use decoder::RegionDecoder;
pub use error::{Error, Result};
pub use header::FileHeader;
pub use info::Identification;
pub use layout::{decompose_plane, BlockLayout, PlaneLocation};
pub use measure::{MeasStopInfo, MeasureInfo};
pub use parser::{HeaderParser, HeaderRecord, ParserConfig};
