//! Per-plane byte geometry.
//!
//! Rows on disk are padded to a multiple of four pixels. Every seek the
//! decoder computes goes through [`PlaneGeometry`], so the padding rule
//! lives in exactly one place.

use crate::region::Region;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row alignment of the acquisition hardware, in pixels.
pub const ROW_ALIGNMENT: usize = 4;

/// Returns `width` rounded up to the next multiple of [`ROW_ALIGNMENT`].
#[inline]
#[must_use]
pub fn padded_width(width: usize) -> usize {
    width + ((ROW_ALIGNMENT - (width % ROW_ALIGNMENT)) % ROW_ALIGNMENT)
}

/// Byte layout of one spectral plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneGeometry {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Histogram bins per pixel.
    pub time_bins: usize,
    /// Bytes per histogram sample.
    pub bytes_per_sample: usize,
    /// Width including row padding.
    pub padded_width: usize,
    /// Bytes of one pixel's full histogram.
    pub bytes_per_transient: usize,
    /// Bytes of one padded plane.
    pub plane_byte_size: usize,
}

impl PlaneGeometry {
    /// Computes the geometry for the given declared dimensions.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDimensions`] if any dimension is zero, and
    /// [`Error::SizeOverflow`] if the plane size does not fit in `usize`.
    pub fn new(
        width: usize,
        height: usize,
        time_bins: usize,
        bytes_per_sample: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 || time_bins == 0 || bytes_per_sample == 0 {
            return Err(invalid(width as i64, height as i64, time_bins as i64));
        }

        let padded_width = padded_width(width);
        let bytes_per_transient = bytes_per_sample
            .checked_mul(time_bins)
            .ok_or(Error::SizeOverflow("bytes per transient"))?;
        let plane_byte_size = padded_width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(bytes_per_transient))
            .ok_or(Error::SizeOverflow("plane byte size"))?;

        Ok(Self {
            width,
            height,
            time_bins,
            bytes_per_sample,
            padded_width,
            bytes_per_transient,
            plane_byte_size,
        })
    }

    /// Like [`Self::new`], for dimensions read as signed header fields.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDimensions`] for zero or negative dimensions.
    pub fn from_signed(
        width: i64,
        height: i64,
        time_bins: i64,
        bytes_per_sample: usize,
    ) -> Result<Self> {
        let to_usize = |v: i64| usize::try_from(v).ok().filter(|&v| v > 0);
        match (to_usize(width), to_usize(height), to_usize(time_bins)) {
            (Some(w), Some(h), Some(t)) => Self::new(w, h, t, bytes_per_sample),
            _ => Err(invalid(width, height, time_bins)),
        }
    }

    /// Bytes of one padded row.
    #[inline]
    #[must_use]
    pub fn row_stride(&self) -> usize {
        self.padded_width * self.bytes_per_transient
    }

    /// Bytes between the start of a plane and the start of row `y`.
    #[inline]
    #[must_use]
    pub fn row_offset(&self, y: usize) -> usize {
        y * self.row_stride()
    }

    /// Bytes skipped at the end of a row after reading `region`'s columns.
    #[inline]
    #[must_use]
    pub fn row_tail(&self, region: &Region) -> usize {
        (self.padded_width - region.x - region.width) * self.bytes_per_transient
    }

    /// Region covering the whole plane.
    #[must_use]
    pub fn full_region(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Unpadded bytes of the whole plane (`width * height` transients).
    #[must_use]
    pub fn unpadded_plane_bytes(&self) -> usize {
        self.width * self.height * self.bytes_per_transient
    }

    /// Bytes a decoded, uncollapsed `region` occupies.
    #[must_use]
    pub fn region_bytes(&self, region: &Region) -> usize {
        region.pixel_count() * self.bytes_per_transient
    }

    /// Verifies that `region` lies inside the plane.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRegion`] otherwise.
    pub fn check_region(&self, region: &Region) -> Result<()> {
        if region.is_within(self.width, self.height) {
            Ok(())
        } else {
            Err(Error::InvalidRegion {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                plane_width: self.width,
                plane_height: self.height,
            })
        }
    }
}

fn invalid(width: i64, height: i64, time_bins: i64) -> Error {
    Error::InvalidDimensions {
        width,
        height,
        time_bins,
    }
}
