//! Synthetic SDT files for tests.
//!
//! Enabled by the `test-util` feature. Files are built in memory with a
//! known sample pattern so decoded values can be checked pixel by pixel.

use crate::block::{BlockHeader, BlockType, BLOCK_COMPRESSED, BLOCK_HEADER_SIZE};
use crate::container::compress_block;
use crate::header::{FileHeader, FILE_HEADER_SIZE, HEADER_VALID, LONG_BLOCK_COUNT_MARKER};
use crate::layout::BlockLayout;
use crate::measure::{
    MeasStopInfo, MeasureInfo, FIFO_MEASUREMENT_MODE, MEASURE_INFO_SIZE, MEAS_STOP_INFO_SIZE,
};
use flimsdt_core::padded_width;
use std::io;

/// Sample value written into row padding.
pub const PADDING_SAMPLE: u16 = 0xDEAD;

/// Filler for measurement description bytes past the known records.
pub const TRAILING_FILLER: u8 = 0xA5;

const IDENTIFICATION: &str = "*IDENTIFICATION\r\n  ID        : \u{4}SPC Setup & Data File\u{4}\r\n  Title     : synthetic\r\n  Version   : 1  781 M\r\n  Revision  : 8 bits ADC\r\n  Author    : flimsdt\r\n*END\r\n\r\n";

const SETUP: &[u8] = b"*SETUP\r\nSP_MODE,I,9\r\nSP_ADC_RE,I,256\r\n*END\r\n\x00\x01\x02\x03";

/// Default sample pattern: distinct for every plane, pixel and bin.
#[must_use]
pub fn default_pattern(plane: usize, x: usize, y: usize, bin: usize) -> u16 {
    ((plane * 1000 + y * 100 + x * 10 + bin) % 0xD000) as u16
}

/// Builds SDT files in memory.
#[derive(Debug, Clone)]
pub struct SdtBuilder {
    pub width: usize,
    pub height: usize,
    pub time_bins: usize,
    pub channels: usize,
    pub layout: BlockLayout,
    /// Blocks in a chained-per-plane file; defaults to the channel count.
    pub block_count: Option<usize>,
    pub compressed: bool,
    /// Type bits of every block, before the compression bit.
    pub block_type: u16,
    pub tac_range: f32,
    pub tac_gain: i16,
    /// Declared measurement description length; defaults to both records.
    pub measure_block_length: Option<usize>,
    /// Store the block count in `reserved1` even when it would fit.
    pub long_block_count: bool,
    pub pattern: fn(usize, usize, usize, usize) -> u16,
}

impl SdtBuilder {
    /// A standard-layout, single-channel file.
    #[must_use]
    pub fn new(width: usize, height: usize, time_bins: usize) -> Self {
        Self {
            width,
            height,
            time_bins,
            channels: 1,
            layout: BlockLayout::Standard,
            block_count: None,
            compressed: false,
            block_type: 0,
            tac_range: 50e-9,
            tac_gain: 4,
            measure_block_length: None,
            long_block_count: false,
            pattern: default_pattern,
        }
    }

    #[must_use]
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: BlockLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_block_count(mut self, block_count: usize) -> Self {
        self.block_count = Some(block_count);
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    #[must_use]
    pub fn with_block_type(mut self, block_type: u16) -> Self {
        self.block_type = block_type;
        self
    }

    #[must_use]
    pub fn with_tac(mut self, range: f32, gain: i16) -> Self {
        self.tac_range = range;
        self.tac_gain = gain;
        self
    }

    /// Truncates or extends the measurement description block to `length`
    /// bytes. Extra bytes are [`TRAILING_FILLER`].
    #[must_use]
    pub fn with_measure_block_length(mut self, length: usize) -> Self {
        self.measure_block_length = Some(length);
        self
    }

    #[must_use]
    pub fn with_long_block_count(mut self, long: bool) -> Self {
        self.long_block_count = long;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: fn(usize, usize, usize, usize) -> u16) -> Self {
        self.pattern = pattern;
        self
    }

    /// Value stored for `bin` of pixel `(x, y)` in `plane`.
    #[must_use]
    pub fn sample(&self, plane: usize, x: usize, y: usize, bin: usize) -> u16 {
        (self.pattern)(plane, x, y, bin)
    }

    /// Number of data blocks the file will declare.
    #[must_use]
    pub fn declared_blocks(&self) -> usize {
        match self.layout {
            BlockLayout::Standard => 1,
            BlockLayout::ChainedPerPlane => self.block_count.unwrap_or(self.channels).max(1),
            BlockLayout::ChainedPerPixel => self.width * self.height,
        }
    }

    /// Offset of the first data block header.
    #[must_use]
    pub fn data_block_offset(&self) -> usize {
        self.measure_offset() + self.measure_length()
    }

    fn info_offset(&self) -> usize {
        FILE_HEADER_SIZE
    }

    fn setup_offset(&self) -> usize {
        self.info_offset() + IDENTIFICATION.len()
    }

    fn measure_offset(&self) -> usize {
        self.setup_offset() + SETUP.len()
    }

    fn measure_length(&self) -> usize {
        self.measure_block_length.unwrap_or(MEASURE_INFO_SIZE + MEAS_STOP_INFO_SIZE)
    }

    fn measure_block(&self) -> io::Result<Vec<u8>> {
        let mut block = Vec::with_capacity(self.measure_length());
        self.measure_info().write_to(&mut block)?;
        MeasStopInfo::default().write_to(&mut block)?;
        block.resize(self.measure_length(), TRAILING_FILLER);
        Ok(block)
    }

    fn measure_info(&self) -> MeasureInfo {
        MeasureInfo {
            time: "13:22:11".to_string(),
            date: "2003-11-28".to_string(),
            mod_ser_no: "SYNTH0001".to_string(),
            mod_type: "SPC-830".to_string(),
            meas_mode: match self.layout {
                BlockLayout::ChainedPerPlane => FIFO_MEASUREMENT_MODE,
                _ => 9,
            },
            tac_r: self.tac_range,
            tac_g: self.tac_gain,
            adc_re: self.time_bins as i16,
            scan_x: self.width as i32,
            scan_y: self.height as i32,
            scan_rx: self.channels as i32,
            scan_ry: 1,
            ..MeasureInfo::default()
        }
    }

    /// One padded plane, row-major.
    fn plane_bytes(&self, plane: usize) -> Vec<u8> {
        let padded = padded_width(self.width);
        let mut out = Vec::with_capacity(padded * self.height * self.time_bins * 2);
        for y in 0..self.height {
            for x in 0..padded {
                for bin in 0..self.time_bins {
                    let value = if x < self.width {
                        self.sample(plane, x, y, bin)
                    } else {
                        PADDING_SAMPLE
                    };
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        out
    }

    /// Histograms of every channel for one pixel, channel after channel.
    fn pixel_bytes(&self, x: usize, y: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.channels * self.time_bins * 2);
        for plane in 0..self.channels {
            for bin in 0..self.time_bins {
                out.extend_from_slice(&self.sample(plane, x, y, bin).to_le_bytes());
            }
        }
        out
    }

    /// Uncompressed payloads of every block, in chain order.
    fn payloads(&self) -> Vec<Vec<u8>> {
        match self.layout {
            BlockLayout::Standard => {
                vec![(0..self.channels).flat_map(|p| self.plane_bytes(p)).collect()]
            }
            BlockLayout::ChainedPerPlane => {
                let blocks = self.declared_blocks();
                (0..blocks)
                    .map(|cycle| {
                        (0..blocks)
                            .map(|channel| cycle * blocks + channel)
                            .filter(|&plane| plane < self.channels)
                            .flat_map(|plane| self.plane_bytes(plane))
                            .collect()
                    })
                    .collect()
            }
            BlockLayout::ChainedPerPixel => (0..self.height)
                .rev()
                .flat_map(|y| (0..self.width).map(move |x| (x, y)))
                .map(|(x, y)| self.pixel_bytes(x, y))
                .collect(),
        }
    }

    /// Encodes the file.
    ///
    /// # Errors
    /// Returns an I/O error if a record or compressed payload cannot be
    /// encoded.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        let mut block_type = self.block_type;
        let payloads: Vec<Vec<u8>> = if self.compressed {
            block_type |= BLOCK_COMPRESSED;
            self.payloads()
                .iter()
                .map(|p| compress_block("data_block", p))
                .collect::<io::Result<_>>()?
        } else {
            self.payloads()
        };

        let data_start = self.data_block_offset();
        let mut blocks = Vec::new();
        let mut offset = data_start;
        for (index, payload) in payloads.iter().enumerate() {
            let next = offset + BLOCK_HEADER_SIZE + payload.len();
            let header = BlockHeader {
                block_no: (index + 1) as i16,
                data_offs: (offset + BLOCK_HEADER_SIZE) as i32,
                next_block_offs: if index + 1 < payloads.len() { next as i32 } else { 0 },
                block_type: BlockType(block_type),
                meas_desc_block_no: 0,
                lblock_no: index as u32,
                block_length: payload.len() as u32,
            };
            blocks.extend_from_slice(&header.to_bytes());
            blocks.extend_from_slice(payload);
            offset = next;
        }

        let count = payloads.len();
        let long = self.long_block_count || count >= LONG_BLOCK_COUNT_MARKER as usize;
        let (no_of_data_blocks, reserved1) = if long {
            (LONG_BLOCK_COUNT_MARKER, count as u32)
        } else {
            (count as i16, 0)
        };
        let mut header = FileHeader {
            revision: 0x0F3,
            info_offs: self.info_offset() as i32,
            info_length: IDENTIFICATION.len() as i16,
            setup_offs: self.setup_offset() as i32,
            setup_length: SETUP.len() as i16,
            data_block_offs: data_start as i32,
            no_of_data_blocks,
            data_block_length: payloads.first().map_or(0, Vec::len) as i32,
            meas_desc_block_offs: self.measure_offset() as i32,
            no_of_meas_desc_blocks: 1,
            meas_desc_block_length: self.measure_length() as i16,
            header_valid: HEADER_VALID,
            reserved1,
            reserved2: 0,
            chksum: 0,
        };
        header.chksum = header.expected_checksum();

        let mut out = Vec::with_capacity(data_start + blocks.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(IDENTIFICATION.as_bytes());
        out.extend_from_slice(SETUP);
        out.extend_from_slice(&self.measure_block()?);
        out.extend_from_slice(&blocks);
        Ok(out)
    }
}
