//! Classification of the on-disk block layout.

use crate::measure::FIFO_MEASUREMENT_MODE;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How planes are laid out across data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockLayout {
    /// One block holding all planes contiguously.
    Standard,
    /// FIFO files: a chain of blocks, each holding complete planes.
    ChainedPerPlane,
    /// One block per pixel holding that pixel's histograms for every channel.
    ChainedPerPixel,
}

impl BlockLayout {
    /// Selects the layout from the measurement mode and data block count.
    #[must_use]
    pub fn classify(measurement_mode: i16, block_count: u32) -> Self {
        if measurement_mode == FIFO_MEASUREMENT_MODE {
            BlockLayout::ChainedPerPlane
        } else if block_count > 1 {
            BlockLayout::ChainedPerPixel
        } else {
            BlockLayout::Standard
        }
    }
}

impl fmt::Display for BlockLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockLayout::Standard => "standard",
            BlockLayout::ChainedPerPlane => "chained per plane",
            BlockLayout::ChainedPerPixel => "chained per pixel",
        })
    }
}

/// Position of a plane in a chained-per-plane file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLocation {
    /// Plane within its block.
    pub channel_index: usize,
    /// Number of chain hops to the block.
    pub cycle_index: usize,
}

/// Splits a channel-major plane index into channel and repeat cycle.
#[must_use]
pub fn decompose_plane(plane_index: usize, block_count: u32) -> PlaneLocation {
    let blocks = (block_count as usize).max(1);
    PlaneLocation {
        channel_index: plane_index % blocks,
        cycle_index: plane_index / blocks,
    }
}
