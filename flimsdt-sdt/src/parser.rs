//! SDT header parser.

use crate::block::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::header::{FileHeader, FILE_HEADER_SIZE, HEADER_VALID};
use crate::info::{setup_text, Identification};
use crate::layout::BlockLayout;
use crate::measure::{MeasStopInfo, MeasureInfo, MEASURE_INFO_SIZE, MEAS_STOP_INFO_SIZE};
use crate::stream::{read_exact_at, read_up_to_at};
use crate::{Error, Result};
use flimsdt_core::{ByteOrder, ImageShape, MetadataTable, PlaneGeometry};
use log::{debug, info, warn};
use std::io::{Read, Seek};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes per histogram sample of decoded planes.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Configuration for the header parser.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    /// Reject headers whose word sum does not match the checksum.
    pub verify_checksum: bool,
    /// Reject headers not marked as completely written.
    pub strict_header_valid: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            strict_header_valid: true,
        }
    }
}

impl ParserConfig {
    /// Creates a parser configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the header checksum is verified.
    #[must_use]
    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Sets whether the header-valid marker is required.
    #[must_use]
    pub fn with_strict_header_valid(mut self, strict: bool) -> Self {
        self.strict_header_valid = strict;
        self
    }
}

/// Everything the decoder needs from a file header, parsed once at open.
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    pub file_header: FileHeader,
    pub measure_info: MeasureInfo,
    pub stop_info: Option<MeasStopInfo>,
    pub identification: Identification,
    pub setup: String,
    /// Header of the first data block.
    pub first_block: BlockHeader,

    pub width: usize,
    pub height: usize,
    pub time_bins: usize,
    pub channels: usize,
    /// Offset of the first data block header.
    pub data_block_offset: u64,
    pub block_count: u32,
    pub measurement_mode: i16,
    pub tac_range: f32,
    pub tac_gain: i16,
    /// Nanoseconds per full sweep of the time axis.
    pub time_base_ns: f64,
    /// Type bits of the first data block.
    pub block_type_flags: u16,
    pub layout: BlockLayout,
    pub geometry: PlaneGeometry,
    pub metadata: MetadataTable,
}

impl HeaderRecord {
    /// Bytes between a block header and its first pixel.
    pub const HEADER_OVERHEAD: u64 = BLOCK_HEADER_SIZE as u64;

    /// Number of addressable planes.
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.channels
    }

    /// True if the first data block is compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.first_block.block_type.is_compressed()
    }

    /// Offset of the first pixel of the first block.
    #[must_use]
    pub fn bin_offset(&self) -> u64 {
        self.data_block_offset + Self::HEADER_OVERHEAD
    }

    /// Unmerged output shape of this file.
    #[must_use]
    pub fn shape(&self) -> ImageShape {
        ImageShape::new(
            self.width,
            self.height,
            self.time_bins,
            self.channels,
            BYTES_PER_SAMPLE,
            self.time_base_ns,
        )
    }

    /// Byte order of histogram samples.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        ByteOrder::LittleEndian
    }
}

/// Parses SDT headers into [`HeaderRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct HeaderParser {
    config: ParserConfig,
}

impl HeaderParser {
    /// Creates a parser with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser with the given configuration.
    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Reads the file header, measurement description and first block
    /// header from `reader`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if the header is inconsistent or
    /// describes an empty image, and I/O errors from the reader.
    pub fn parse<R: Read + Seek>(&self, reader: &mut R) -> Result<HeaderRecord> {
        debug!("reading SDT header");

        let mut raw = [0u8; FILE_HEADER_SIZE];
        read_exact_at(reader, 0, &mut raw).map_err(|e| match e {
            Error::TruncatedRead { actual, .. } => Error::MalformedHeader(format!(
                "file holds {actual} bytes, shorter than the {FILE_HEADER_SIZE}-byte header"
            )),
            other => other,
        })?;
        let file_header = FileHeader::from_bytes(&raw)?;
        self.validate(&file_header)?;

        let mut metadata = MetadataTable::new();
        file_header.fill_metadata(&mut metadata);

        let identification =
            match text_block(reader, file_header.info_offs, file_header.info_length)? {
                Some(bytes) => Identification::parse(&bytes),
                None => Identification::default(),
            };
        identification.fill_metadata(&mut metadata);

        let setup = text_block(reader, file_header.setup_offs, file_header.setup_length)?
            .map(|bytes| setup_text(&bytes))
            .unwrap_or_default();

        let (measure_info, stop_info) = read_measure_block(reader, &file_header)?;
        measure_info.fill_metadata(&mut metadata);
        if let Some(stop) = &stop_info {
            stop.fill_metadata(&mut metadata);
        }

        let block_count = file_header.data_block_count();
        if block_count == 0 {
            return Err(Error::MalformedHeader("file declares no data blocks".to_string()));
        }
        let data_block_offset = u64::try_from(file_header.data_block_offs)
            .ok()
            .filter(|&o| o >= FILE_HEADER_SIZE as u64)
            .ok_or_else(|| {
                Error::MalformedHeader(format!(
                    "data block offset {} overlaps the file header",
                    file_header.data_block_offs
                ))
            })?;
        let first_block = BlockHeader::read_at(reader, data_block_offset).map_err(|e| match e {
            Error::TruncatedRead { offset, .. } => Error::MalformedHeader(format!(
                "first data block header at {offset} lies past the end of the file"
            )),
            other => other,
        })?;
        first_block.fill_metadata(&mut metadata);

        let geometry = PlaneGeometry::from_signed(
            i64::from(measure_info.scan_x),
            i64::from(measure_info.scan_y),
            i64::from(measure_info.adc_re),
            BYTES_PER_SAMPLE,
        )
        .map_err(|e| Error::MalformedHeader(e.to_string()))?;
        let channels = usize::try_from(measure_info.scan_rx)
            .ok()
            .filter(|&c| c > 0)
            .unwrap_or(1);

        if measure_info.tac_g == 0 {
            return Err(Error::MalformedHeader("TAC gain is zero".to_string()));
        }
        let time_base_ns = 1e9 * f64::from(measure_info.tac_r) / f64::from(measure_info.tac_g);

        let measurement_mode = measure_info.meas_mode;
        let layout = BlockLayout::classify(measurement_mode, block_count);

        metadata.insert("time bins", geometry.time_bins);
        metadata.insert("channels", channels);
        metadata.insert("time base", time_base_ns);

        if layout == BlockLayout::Standard && !first_block.block_type.is_compressed() {
            let expected = geometry.plane_byte_size.saturating_mul(channels);
            let declared = usize::try_from(file_header.data_block_length).unwrap_or(0);
            if declared != expected {
                warn!(
                    "data block length {declared} differs from {expected} bytes implied by \
                     {channels} planes of {}x{}x{}",
                    geometry.width, geometry.height, geometry.time_bins
                );
            }
        }

        info!(
            "SDT header: {}x{} pixels, {} time bins, {} channels, {} layout, {} block(s)",
            geometry.width, geometry.height, geometry.time_bins, channels, layout, block_count
        );

        Ok(HeaderRecord {
            width: geometry.width,
            height: geometry.height,
            time_bins: geometry.time_bins,
            channels,
            data_block_offset,
            block_count,
            measurement_mode,
            tac_range: measure_info.tac_r,
            tac_gain: measure_info.tac_g,
            time_base_ns,
            block_type_flags: first_block.block_type.0,
            layout,
            geometry,
            metadata,
            file_header,
            measure_info,
            stop_info,
            identification,
            setup,
            first_block,
        })
    }

    fn validate(&self, header: &FileHeader) -> Result<()> {
        if header.header_valid != HEADER_VALID {
            if self.config.strict_header_valid {
                return Err(Error::MalformedHeader(format!(
                    "header valid marker is {:#06x}, expected {HEADER_VALID:#06x}",
                    header.header_valid
                )));
            }
            warn!("header valid marker is {:#06x}", header.header_valid);
        }
        if !header.checksum_ok() {
            if self.config.verify_checksum {
                return Err(Error::MalformedHeader(format!(
                    "checksum {:#06x} does not match header (expected {:#06x})",
                    header.chksum,
                    header.expected_checksum()
                )));
            }
            warn!(
                "ignoring header checksum mismatch: {:#06x}, expected {:#06x}",
                header.chksum,
                header.expected_checksum()
            );
        }
        Ok(())
    }
}

/// Reads an optional text block; absent when offset or length is zero.
fn text_block<R: Read + Seek>(
    reader: &mut R,
    offset: i32,
    length: i16,
) -> Result<Option<Vec<u8>>> {
    match (u64::try_from(offset), usize::try_from(length)) {
        (Ok(offset), Ok(length)) if offset > 0 && length > 0 => {
            Ok(Some(read_up_to_at(reader, offset, length)?))
        }
        _ => Ok(None),
    }
}

fn read_measure_block<R: Read + Seek>(
    reader: &mut R,
    header: &FileHeader,
) -> Result<(MeasureInfo, Option<MeasStopInfo>)> {
    let offset = u64::try_from(header.meas_desc_block_offs).unwrap_or(0);
    let length = usize::try_from(header.meas_desc_block_length).unwrap_or(0);
    if header.no_of_meas_desc_blocks < 1 || offset == 0 || length == 0 {
        return Err(Error::MalformedHeader(
            "no measurement description block".to_string(),
        ));
    }

    let bytes = read_up_to_at(reader, offset, length)?;
    if bytes.len() < length {
        return Err(Error::MalformedHeader(format!(
            "measurement description block at {offset} truncated: {} of {length} bytes",
            bytes.len()
        )));
    }
    let measure = MeasureInfo::from_bytes(&bytes)?;
    let stop = bytes
        .get(MEASURE_INFO_SIZE..MEASURE_INFO_SIZE + MEAS_STOP_INFO_SIZE)
        .map(MeasStopInfo::from_bytes)
        .transpose()?;
    Ok((measure, stop))
}
