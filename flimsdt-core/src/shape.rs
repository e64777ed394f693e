//! Declared output shape of a plane read.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axes of an SDT image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// Photon arrival time histogram.
    Lifetime,
    X,
    Y,
    /// Spectral / detector channel.
    Channel,
}

/// Linear calibration of an axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisCalibration {
    pub unit: String,
    pub scale: f64,
    pub origin: f64,
}

/// Axis lengths for one image, following the intensity-merge setting.
///
/// Unmerged planes are `[Lifetime, X, Y]`; merged planes drop the lifetime
/// axis. `Channel` is always the one non-planar axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
    pub time_bins: usize,
    pub channels: usize,
    pub bytes_per_sample: usize,
    /// Full sweep of the time axis in nanoseconds.
    pub time_base_ns: f64,
    merged: bool,
}

impl ImageShape {
    /// Creates an unmerged shape.
    #[must_use]
    pub fn new(
        width: usize,
        height: usize,
        time_bins: usize,
        channels: usize,
        bytes_per_sample: usize,
        time_base_ns: f64,
    ) -> Self {
        Self {
            width,
            height,
            time_bins,
            channels,
            bytes_per_sample,
            time_base_ns,
            merged: false,
        }
    }

    /// Returns the shape re-derived for the given merge setting.
    #[must_use]
    pub fn with_merge(mut self, merged: bool) -> Self {
        self.merged = merged;
        self
    }

    /// Whether histograms are collapsed to intensities.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// All axes with their lengths, planar axes first.
    #[must_use]
    pub fn axes(&self) -> Vec<(Axis, usize)> {
        let mut axes = self.planar_axes();
        axes.push((Axis::Channel, self.channels));
        axes
    }

    /// Axes making up one plane.
    #[must_use]
    pub fn planar_axes(&self) -> Vec<(Axis, usize)> {
        let mut axes = Vec::with_capacity(3);
        if !self.merged {
            axes.push((Axis::Lifetime, self.time_bins));
        }
        axes.push((Axis::X, self.width));
        axes.push((Axis::Y, self.height));
        axes
    }

    /// Length of `axis`, or `None` if the shape does not currently have it.
    #[must_use]
    pub fn axis_length(&self, axis: Axis) -> Option<usize> {
        self.axes()
            .into_iter()
            .find_map(|(a, len)| (a == axis).then_some(len))
    }

    /// Samples stored per pixel of a plane read.
    #[must_use]
    pub fn samples_per_pixel(&self) -> usize {
        if self.merged {
            1
        } else {
            self.time_bins
        }
    }

    /// Bytes a full plane read returns.
    #[must_use]
    pub fn plane_bytes(&self) -> usize {
        self.width * self.height * self.samples_per_pixel() * self.bytes_per_sample
    }

    /// Calibration of the lifetime axis: nanoseconds per bin.
    #[must_use]
    pub fn lifetime_calibration(&self) -> Option<AxisCalibration> {
        if self.merged || self.time_bins == 0 {
            return None;
        }
        Some(AxisCalibration {
            unit: "ns".to_string(),
            scale: self.time_base_ns / self.time_bins as f64,
            origin: 0.0,
        })
    }
}
