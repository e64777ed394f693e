//! Region decoding for the three SDT block layouts.
//!
//! The decoder is stateless apart from the borrowed [`HeaderRecord`]; all
//! scratch buffers are sized per call. Every read goes through the byte
//! source handed to [`RegionDecoder::decode`], so independent decoders on
//! independent cursors can run concurrently over the same file.

use crate::block::{locate_block, BlockChain, LocatedBlock};
use crate::container::decompress_block;
use crate::layout::{decompose_plane, BlockLayout};
use crate::parser::{HeaderRecord, BYTES_PER_SAMPLE};
use crate::stream::{read_exact, read_exact_at, skip};
use crate::{Error, Result};
use flimsdt_core::{crop_rows, DecodedRegion, PlaneGeometry, PlaneRequest, Region};
use log::debug;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Decodes rectangular regions of planes.
#[derive(Debug, Clone, Copy)]
pub struct RegionDecoder<'a> {
    record: &'a HeaderRecord,
}

impl<'a> RegionDecoder<'a> {
    /// Creates a decoder for the file described by `record`.
    #[must_use]
    pub fn new(record: &'a HeaderRecord) -> Self {
        Self { record }
    }

    /// Strategy used for this file.
    #[must_use]
    pub fn layout(&self) -> BlockLayout {
        self.record.layout
    }

    #[must_use]
    pub fn geometry(&self) -> &PlaneGeometry {
        &self.record.geometry
    }

    /// Byte length of the decoded, uncollapsed output for `request`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPlane`] or an invalid-region error if the
    /// request does not address this file.
    pub fn output_len(&self, request: &PlaneRequest) -> Result<usize> {
        self.validate(request)?;
        Ok(self.record.geometry.region_bytes(&request.region))
    }

    /// Decodes `request` into a new [`DecodedRegion`].
    ///
    /// # Errors
    /// See [`Self::decode_into`].
    pub fn decode<R: Read + Seek>(
        &self,
        reader: &mut R,
        request: &PlaneRequest,
    ) -> Result<DecodedRegion> {
        let mut data = vec![0u8; self.output_len(request)?];
        self.decode_into(reader, request, &mut data)?;
        Ok(DecodedRegion::new(
            request.region,
            self.record.time_bins,
            BYTES_PER_SAMPLE,
            self.record.byte_order(),
            data,
        )?)
    }

    /// Decodes all of plane `plane_index`.
    ///
    /// # Errors
    /// See [`Self::decode_into`].
    pub fn decode_full_plane<R: Read + Seek>(
        &self,
        reader: &mut R,
        plane_index: usize,
    ) -> Result<DecodedRegion> {
        let request = PlaneRequest::new(plane_index, self.record.geometry.full_region());
        self.decode(reader, &request)
    }

    /// Decodes `request` into `out`, which must hold exactly
    /// [`Self::output_len`] bytes.
    ///
    /// # Errors
    /// - [`Error::InvalidPlane`] / invalid region for requests outside the file
    /// - [`Error::ChainTraversal`] if a block chain ends or loops early
    /// - [`Error::UnsupportedLayout`] for sample formats or compression
    ///   the layout does not define
    /// - [`Error::TruncatedRead`] if the source ends inside a row, or the
    ///   region extends past the block's declared length
    pub fn decode_into<R: Read + Seek>(
        &self,
        reader: &mut R,
        request: &PlaneRequest,
        out: &mut [u8],
    ) -> Result<()> {
        let expected = self.output_len(request)?;
        if out.len() != expected {
            return Err(flimsdt_core::Error::BufferSize {
                expected,
                actual: out.len(),
            }
            .into());
        }
        self.check_sample_width()?;

        debug!(
            "decoding plane {} region {:?} with {} strategy",
            request.plane_index,
            request.region,
            self.record.layout
        );
        match self.record.layout {
            BlockLayout::Standard => self.decode_standard(reader, request, out),
            BlockLayout::ChainedPerPlane => self.decode_chained_per_plane(reader, request, out),
            BlockLayout::ChainedPerPixel => self.decode_chained_per_pixel(reader, request, out),
        }
    }

    /// Reads every pixel block of a chained-per-pixel plane into a full,
    /// unpadded row-major plane buffer.
    ///
    /// Blocks are stored bottom row first, left to right; each holds one
    /// histogram per channel.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedLayout`] for compressed pixel blocks and
    /// [`Error::ChainTraversal`] if the chain holds fewer blocks than pixels.
    pub fn scan_pixel_blocks<R: Read + Seek>(
        &self,
        reader: &mut R,
        plane_index: usize,
    ) -> Result<Vec<u8>> {
        let g = &self.record.geometry;
        let bpt = g.bytes_per_transient;
        let channel_skip = (plane_index * bpt) as u64;
        let mut plane = vec![0u8; g.unpadded_plane_bytes()];
        let mut chain = BlockChain::new(self.record.data_block_offset, self.record.block_count);

        for row in (0..g.height).rev() {
            for col in 0..g.width {
                let block = chain.next_block(reader)?;
                if block.header.block_type.is_compressed() {
                    return Err(compressed_pixel_block(&block));
                }
                let start = (row * g.width + col) * bpt;
                read_exact_at(
                    reader,
                    block.data_offset() + channel_skip,
                    &mut plane[start..start + bpt],
                )?;
            }
        }
        debug!(
            "scanned {} pixel blocks for plane {}",
            chain.visited(),
            plane_index
        );
        Ok(plane)
    }

    fn validate(&self, request: &PlaneRequest) -> Result<()> {
        let count = self.record.plane_count();
        if request.plane_index >= count {
            return Err(Error::InvalidPlane {
                index: request.plane_index,
                count,
            });
        }
        self.record.geometry.check_region(&request.region)?;
        Ok(())
    }

    fn check_sample_width(&self) -> Result<()> {
        let block_type = self.record.first_block.block_type;
        match block_type.bytes_per_sample() {
            Some(BYTES_PER_SAMPLE) => Ok(()),
            Some(other) => Err(Error::UnsupportedLayout(format!(
                "{other}-byte samples (block type {:#06x})",
                block_type.0
            ))),
            None => Err(Error::UnsupportedLayout(format!(
                "non-integer sample format (block type {:#06x})",
                block_type.0
            ))),
        }
    }

    fn decode_standard<R: Read + Seek>(
        &self,
        reader: &mut R,
        request: &PlaneRequest,
        out: &mut [u8],
    ) -> Result<()> {
        let block = LocatedBlock {
            index: 0,
            header_offset: self.record.data_block_offset,
            header: self.record.first_block.clone(),
        };
        let g = &self.record.geometry;
        let offset = request.plane_index * g.plane_byte_size + g.row_offset(request.region.y);
        self.read_block_rows(reader, &block, offset, &request.region, out)
    }

    fn decode_chained_per_plane<R: Read + Seek>(
        &self,
        reader: &mut R,
        request: &PlaneRequest,
        out: &mut [u8],
    ) -> Result<()> {
        let location = decompose_plane(request.plane_index, self.record.block_count);
        let block = locate_block(
            reader,
            self.record.data_block_offset,
            location.cycle_index,
            self.record.block_count,
        )?;
        let g = &self.record.geometry;
        let offset =
            location.channel_index * g.plane_byte_size + g.row_offset(request.region.y);
        self.read_block_rows(reader, &block, offset, &request.region, out)
    }

    fn decode_chained_per_pixel<R: Read + Seek>(
        &self,
        reader: &mut R,
        request: &PlaneRequest,
        out: &mut [u8],
    ) -> Result<()> {
        if self.record.is_compressed() {
            return Err(Error::UnsupportedLayout(
                "compressed blocks in the chained-per-pixel layout".to_string(),
            ));
        }

        let g = &self.record.geometry;
        let plane = self.scan_pixel_blocks(reader, request.plane_index)?;
        if request.region.is_full(g.width, g.height) {
            out.copy_from_slice(&plane);
        } else {
            let cropped = crop_rows(&plane, g.width, &request.region, g.bytes_per_transient)?;
            out.copy_from_slice(&cropped);
        }
        Ok(())
    }

    /// Reads `region`'s rows from a block whose plane data starts at
    /// `offset` bytes into the block payload.
    fn read_block_rows<R: Read + Seek>(
        &self,
        reader: &mut R,
        block: &LocatedBlock,
        offset: usize,
        region: &Region,
        out: &mut [u8],
    ) -> Result<()> {
        let g = &self.record.geometry;
        if block.header.block_type.is_compressed() {
            let mut payload = vec![0u8; block.header.block_length as usize];
            read_exact_at(reader, block.data_offset(), &mut payload)?;
            let data = decompress_block(&payload)?;
            debug!(
                "block {} inflated from {} to {} bytes",
                block.index,
                payload.len(),
                data.len()
            );
            let mut cursor = Cursor::new(data);
            cursor.seek(SeekFrom::Start(offset as u64))?;
            read_rows(&mut cursor, g, region, out)
        } else {
            let span = region_span(g, region);
            let length = block.header.block_length as usize;
            if offset + span > length {
                return Err(Error::TruncatedRead {
                    offset: block.data_offset() + offset as u64,
                    expected: span,
                    actual: length.saturating_sub(offset),
                });
            }
            reader.seek(SeekFrom::Start(block.data_offset() + offset as u64))?;
            read_rows(reader, g, region, out)
        }
    }
}

/// Bytes from the start of `region`'s first row to the end of its last
/// pixel.
fn region_span(geometry: &PlaneGeometry, region: &Region) -> usize {
    match region.height {
        0 => 0,
        rows => {
            (rows - 1) * geometry.row_stride()
                + (region.x + region.width) * geometry.bytes_per_transient
        }
    }
}

/// Reads `region.height` padded rows starting at the current position.
///
/// Each row skips the columns left of the region, reads the region's
/// columns, then skips the rest of the padded row.
fn read_rows<R: Read + Seek>(
    reader: &mut R,
    geometry: &PlaneGeometry,
    region: &Region,
    out: &mut [u8],
) -> Result<()> {
    let bpt = geometry.bytes_per_transient;
    let lead = region.x * bpt;
    let tail = geometry.row_tail(region);
    for row in out.chunks_exact_mut(region.width * bpt) {
        skip(reader, lead)?;
        read_exact(reader, row)?;
        skip(reader, tail)?;
    }
    Ok(())
}

fn compressed_pixel_block(block: &LocatedBlock) -> Error {
    Error::UnsupportedLayout(format!(
        "compressed pixel block {} at offset {}",
        block.index, block.header_offset
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HeaderParser;
    use crate::testing::{SdtBuilder, PADDING_SAMPLE};

    fn open(bytes: Vec<u8>) -> (HeaderRecord, Cursor<Vec<u8>>) {
        let mut cursor = Cursor::new(bytes);
        let record = HeaderParser::new().parse(&mut cursor).unwrap();
        (record, cursor)
    }

    fn samples(region: &DecodedRegion) -> Vec<u16> {
        region
            .data
            .chunks_exact(2)
            .map(|s| u16::from_le_bytes([s[0], s[1]]))
            .collect()
    }

    fn expected(builder: &SdtBuilder, plane: usize, region: Region) -> Vec<u16> {
        let mut out = Vec::new();
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                for bin in 0..builder.time_bins {
                    out.push(builder.sample(plane, x, y, bin));
                }
            }
        }
        out
    }

    #[test]
    fn test_standard_region_skips_padding() {
        let builder = SdtBuilder::new(5, 3, 2).with_channels(2);
        let (record, mut cursor) = open(builder.build().unwrap());
        assert_eq!(record.geometry.padded_width, 8);

        let decoder = RegionDecoder::new(&record);
        let region = Region::new(3, 1, 2, 2);
        let decoded = decoder
            .decode(&mut cursor, &PlaneRequest::new(1, region))
            .unwrap();
        let values = samples(&decoded);
        assert!(!values.contains(&PADDING_SAMPLE));
        assert_eq!(values, expected(&builder, 1, region));
    }

    #[test]
    fn test_chained_per_plane_hops_to_cycle() {
        let builder = SdtBuilder::new(4, 2, 3)
            .with_channels(6)
            .with_layout(BlockLayout::ChainedPerPlane)
            .with_block_count(3);
        let (record, mut cursor) = open(builder.build().unwrap());
        assert_eq!(record.layout, BlockLayout::ChainedPerPlane);

        let decoder = RegionDecoder::new(&record);
        for plane in 0..6 {
            let decoded = decoder.decode_full_plane(&mut cursor, plane).unwrap();
            assert_eq!(
                samples(&decoded),
                expected(&builder, plane, Region::new(0, 0, 4, 2)),
                "plane {plane}"
            );
        }
    }

    #[test]
    fn test_chained_per_pixel_rows_bottom_first() {
        let builder = SdtBuilder::new(3, 2, 2)
            .with_channels(2)
            .with_layout(BlockLayout::ChainedPerPixel);
        let (record, mut cursor) = open(builder.build().unwrap());
        assert_eq!(record.block_count, 6);

        let decoder = RegionDecoder::new(&record);
        let region = Region::new(1, 1, 2, 1);
        let decoded = decoder
            .decode(&mut cursor, &PlaneRequest::new(1, region))
            .unwrap();
        assert_eq!(samples(&decoded), expected(&builder, 1, region));
    }

    #[test]
    fn test_rejects_plane_out_of_range() {
        let (record, mut cursor) = open(SdtBuilder::new(4, 2, 2).build().unwrap());
        let decoder = RegionDecoder::new(&record);
        let err = decoder
            .decode(&mut cursor, &PlaneRequest::new(1, Region::new(0, 0, 4, 2)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlane { index: 1, count: 1 }));
    }

    #[test]
    fn test_rejects_region_out_of_bounds() {
        let (record, mut cursor) = open(SdtBuilder::new(4, 2, 2).build().unwrap());
        let decoder = RegionDecoder::new(&record);
        let err = decoder
            .decode(&mut cursor, &PlaneRequest::new(0, Region::new(3, 0, 2, 1)))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(flimsdt_core::Error::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_decode_into_checks_buffer_length() {
        let (record, mut cursor) = open(SdtBuilder::new(4, 2, 2).build().unwrap());
        let decoder = RegionDecoder::new(&record);
        let mut out = vec![0u8; 3];
        let err = decoder
            .decode_into(&mut cursor, &PlaneRequest::new(0, Region::new(0, 0, 1, 1)), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(flimsdt_core::Error::BufferSize {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_four_byte_samples_unsupported() {
        let builder = SdtBuilder::new(4, 2, 2).with_block_type(0x0100);
        let (record, mut cursor) = open(builder.build().unwrap());
        let err = RegionDecoder::new(&record)
            .decode_full_plane(&mut cursor, 0)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedLayout(_)));
    }
}
