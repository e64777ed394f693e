//! Collapsing lifetime histograms into intensity values.
//!
//! The acquisition software sums histogram bins in a 16-bit register, so
//! totals wrap at 65536. [`IntensityMerger`] reproduces that exactly rather
//! than widening or saturating.

use crate::region::DecodedRegion;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ByteOrder {
    /// Least significant byte first (SDT native).
    #[default]
    LittleEndian,
    /// Most significant byte first.
    BigEndian,
}

impl ByteOrder {
    /// Decodes a 16-bit sample.
    #[inline]
    #[must_use]
    pub fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    /// Encodes a 16-bit sample.
    #[inline]
    #[must_use]
    pub fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

/// Sums each pixel's histogram into one 16-bit intensity sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityMerger;

impl IntensityMerger {
    /// Merges raw histogram bytes.
    ///
    /// `data` holds consecutive pixels of `time_bins` samples each. The
    /// output holds one 2-byte sample per pixel in the same byte order.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSampleWidth`] unless `bytes_per_sample`
    /// is 2, and [`Error::BufferSize`] if `data` is not a whole number of
    /// pixels.
    pub fn merge_bytes(
        data: &[u8],
        time_bins: usize,
        bytes_per_sample: usize,
        order: ByteOrder,
    ) -> Result<Vec<u8>> {
        if bytes_per_sample != 2 {
            return Err(Error::UnsupportedSampleWidth(bytes_per_sample));
        }
        let bytes_per_pixel = time_bins * bytes_per_sample;
        if bytes_per_pixel == 0 || data.len() % bytes_per_pixel != 0 {
            return Err(Error::BufferSize {
                expected: data.len().next_multiple_of(bytes_per_pixel.max(1)),
                actual: data.len(),
            });
        }

        let mut out = Vec::with_capacity(data.len() / time_bins);
        for pixel in data.chunks_exact(bytes_per_pixel) {
            let sum = pixel
                .chunks_exact(2)
                .fold(0u16, |acc, s| acc.wrapping_add(order.read_u16([s[0], s[1]])));
            out.extend_from_slice(&order.write_u16(sum));
        }
        Ok(out)
    }

    /// Merges a decoded region, returning a region with one sample per pixel.
    ///
    /// # Errors
    /// See [`Self::merge_bytes`].
    pub fn merge(region: &DecodedRegion) -> Result<DecodedRegion> {
        let data = Self::merge_bytes(
            &region.data,
            region.time_bins,
            region.bytes_per_sample,
            region.byte_order,
        )?;
        DecodedRegion::new(region.region, 1, 2, region.byte_order, data)
    }
}
