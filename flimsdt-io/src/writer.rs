//! Plane export writers.

use crate::{Error, Result};
use flimsdt_core::DecodedRegion;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for decoded plane regions.
///
/// Writes regions as raw sample bytes or as CSV rows in plane coordinates.
pub struct PlaneWriter {
    writer: BufWriter<File>,
}

impl PlaneWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes the region's sample bytes unchanged.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_raw(&mut self, region: &DecodedRegion) -> Result<()> {
        self.writer.write_all(&region.data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the region as CSV.
    ///
    /// Histograms are written as `x,y,bin,count` rows; single-sample pixels
    /// (merged intensity) as `x,y,intensity` rows.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for samples that are not 16-bit, or
    /// an error if writing fails.
    pub fn write_csv(&mut self, region: &DecodedRegion) -> Result<()> {
        if region.bytes_per_sample != 2 {
            return Err(Error::InvalidFormat(format!(
                "cannot export {}-byte samples as CSV",
                region.bytes_per_sample
            )));
        }

        let r = region.region;
        let intensity = region.time_bins == 1;
        if intensity {
            writeln!(self.writer, "x,y,intensity")?;
        } else {
            writeln!(self.writer, "x,y,bin,count")?;
        }

        for row in 0..r.height {
            for col in 0..r.width {
                let Some(samples) = region.histogram_u16(col, row) else {
                    continue;
                };
                let (x, y) = (r.x + col, r.y + row);
                if intensity {
                    writeln!(self.writer, "{x},{y},{}", samples[0])?;
                } else {
                    for (bin, count) in samples.iter().enumerate() {
                        writeln!(self.writer, "{x},{y},{bin},{count}")?;
                    }
                }
            }
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
