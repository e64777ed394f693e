//! flimsdt-core: Core types for decoding time-resolved photon counting images.
//!
//! This crate holds the pieces that do not depend on the SDT container:
//! plane byte geometry, requested regions and decoded pixel buffers,
//! intensity merging, and the property table and axis shape exposed to
//! callers.
//!

pub mod error;
pub mod geometry;
pub mod merge;
pub mod metadata;
pub mod region;
pub mod shape;

pub use error::{Error, Result};
pub use geometry::{padded_width, PlaneGeometry, ROW_ALIGNMENT};
pub use merge::{ByteOrder, IntensityMerger};
pub use metadata::{MetadataTable, MetadataValue};
pub use region::{crop_rows, DecodedRegion, PlaneRequest, Region};
pub use shape::{Axis, AxisCalibration, ImageShape};
