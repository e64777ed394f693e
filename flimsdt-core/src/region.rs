//! Plane requests and decoded pixel regions.

use crate::{ByteOrder, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rectangular region of a plane, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Left column.
    pub x: usize,
    /// Top row.
    pub y: usize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Region {
    /// Creates a region from its corner and extents.
    #[must_use]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels in the region.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// True if the region is non-empty and fits in a `width` x `height` plane.
    #[must_use]
    pub fn is_within(&self, width: usize, height: usize) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|end| end <= width)
            && self.y.checked_add(self.height).is_some_and(|end| end <= height)
    }

    /// True if the region covers a whole `width` x `height` plane.
    #[must_use]
    pub fn is_full(&self, width: usize, height: usize) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// A caller's request for part of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneRequest {
    /// Plane index (channel, or channel and cycle for chained layouts).
    pub plane_index: usize,
    /// Region within the plane.
    pub region: Region,
}

impl PlaneRequest {
    /// Creates a request for `region` of plane `plane_index`.
    #[must_use]
    pub const fn new(plane_index: usize, region: Region) -> Self {
        Self {
            plane_index,
            region,
        }
    }
}

/// Copies the `sub` rectangle out of a row-major buffer `src_width` pixels wide.
///
/// # Errors
/// Returns [`Error::BufferSize`] if `src` is too short for `sub`.
pub fn crop_rows(
    src: &[u8],
    src_width: usize,
    sub: &Region,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>> {
    let src_row = src_width * bytes_per_pixel;
    let out_row = sub.width * bytes_per_pixel;
    let needed = (sub.y + sub.height) * src_row;
    if src.len() < needed || sub.x + sub.width > src_width {
        return Err(Error::BufferSize {
            expected: needed,
            actual: src.len(),
        });
    }

    let mut out = Vec::with_capacity(out_row * sub.height);
    for row in sub.y..sub.y + sub.height {
        let start = row * src_row + sub.x * bytes_per_pixel;
        out.extend_from_slice(&src[start..start + out_row]);
    }
    Ok(out)
}

/// Decoded pixels of one region, row-major.
///
/// Each pixel holds either its full histogram (`time_bins` samples) or,
/// once merged, a single intensity sample.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodedRegion {
    /// Region of the plane these pixels cover.
    pub region: Region,
    /// Samples per pixel.
    pub time_bins: usize,
    /// Bytes per sample.
    pub bytes_per_sample: usize,
    /// Byte order of the samples.
    pub byte_order: ByteOrder,
    /// Raw sample bytes.
    pub data: Vec<u8>,
}

impl DecodedRegion {
    /// Wraps decoded bytes.
    ///
    /// # Errors
    /// Returns [`Error::BufferSize`] if `data` does not hold exactly one
    /// histogram per pixel of `region`.
    pub fn new(
        region: Region,
        time_bins: usize,
        bytes_per_sample: usize,
        byte_order: ByteOrder,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = region.pixel_count() * time_bins * bytes_per_sample;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            region,
            time_bins,
            bytes_per_sample,
            byte_order,
            data,
        })
    }

    /// Bytes per pixel.
    #[inline]
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        self.time_bins * self.bytes_per_sample
    }

    /// Number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.region.pixel_count()
    }

    /// Bytes of the pixel at region-relative `(col, row)`.
    #[must_use]
    pub fn pixel(&self, col: usize, row: usize) -> Option<&[u8]> {
        if col >= self.region.width || row >= self.region.height {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let start = (row * self.region.width + col) * bpp;
        self.data.get(start..start + bpp)
    }

    /// Samples of the pixel at region-relative `(col, row)`, as `u16`.
    ///
    /// Returns `None` outside the region or for non 16-bit samples.
    #[must_use]
    pub fn histogram_u16(&self, col: usize, row: usize) -> Option<Vec<u16>> {
        if self.bytes_per_sample != 2 {
            return None;
        }
        let order = self.byte_order;
        self.pixel(col, row)
            .map(|bytes| bytes.chunks_exact(2).map(|s| order.read_u16([s[0], s[1]])).collect())
    }

    /// Copies a sub-rectangle, given in plane coordinates, into a new region.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRegion`] if `sub` is not inside this region.
    pub fn crop(&self, sub: &Region) -> Result<Self> {
        let inside = sub.x >= self.region.x
            && sub.y >= self.region.y
            && Region::new(
                sub.x - self.region.x,
                sub.y - self.region.y,
                sub.width,
                sub.height,
            )
            .is_within(self.region.width, self.region.height);
        if !inside {
            return Err(Error::InvalidRegion {
                x: sub.x,
                y: sub.y,
                width: sub.width,
                height: sub.height,
                plane_width: self.region.x + self.region.width,
                plane_height: self.region.y + self.region.height,
            });
        }

        let local = Region::new(
            sub.x - self.region.x,
            sub.y - self.region.y,
            sub.width,
            sub.height,
        );
        let data = crop_rows(&self.data, self.region.width, &local, self.bytes_per_pixel())?;
        Ok(Self {
            region: *sub,
            time_bins: self.time_bins,
            bytes_per_sample: self.bytes_per_sample,
            byte_order: self.byte_order,
            data,
        })
    }

    /// Histogram view as a `(rows, cols, bins)` array of 16-bit counts.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSampleWidth`] for non 16-bit samples.
    #[cfg(feature = "ndarray")]
    pub fn to_array(&self) -> Result<ndarray::Array3<u16>> {
        if self.bytes_per_sample != 2 {
            return Err(Error::UnsupportedSampleWidth(self.bytes_per_sample));
        }
        let order = self.byte_order;
        let samples: Vec<u16> = self
            .data
            .chunks_exact(2)
            .map(|s| order.read_u16([s[0], s[1]]))
            .collect();
        ndarray::Array3::from_shape_vec(
            (self.region.height, self.region.width, self.time_bins),
            samples,
        )
        .map_err(|_| Error::BufferSize {
            expected: self.region.pixel_count() * self.bytes_per_pixel(),
            actual: self.data.len(),
        })
    }
}
