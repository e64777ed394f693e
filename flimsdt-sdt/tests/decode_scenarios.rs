#![allow(clippy::cast_possible_truncation, clippy::uninlined_format_args)]
use flimsdt_core::{DecodedRegion, IntensityMerger, PlaneRequest, Region};
use flimsdt_sdt::block::BLOCK_HEADER_SIZE;
use flimsdt_sdt::header::FILE_HEADER_SIZE;
use flimsdt_sdt::testing::SdtBuilder;
use flimsdt_sdt::{BlockLayout, Error, FileHeader, HeaderParser, HeaderRecord, RegionDecoder};
use std::io::Cursor;

fn open(bytes: Vec<u8>) -> (HeaderRecord, Cursor<Vec<u8>>) {
    let mut cursor = Cursor::new(bytes);
    let record = HeaderParser::new().parse(&mut cursor).unwrap();
    (record, cursor)
}

fn patch_header(bytes: &mut [u8], patch: impl FnOnce(&mut FileHeader)) {
    let mut raw = [0u8; FILE_HEADER_SIZE];
    raw.copy_from_slice(&bytes[..FILE_HEADER_SIZE]);
    let mut header = FileHeader::from_bytes(&raw).unwrap();
    patch(&mut header);
    header.chksum = header.expected_checksum();
    bytes[..FILE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
}

fn decode(
    record: &HeaderRecord,
    cursor: &mut Cursor<Vec<u8>>,
    plane: usize,
    region: Region,
) -> flimsdt_sdt::Result<DecodedRegion> {
    RegionDecoder::new(record).decode(cursor, &PlaneRequest::new(plane, region))
}

/// Every sub-rectangle of a `width` x `height` plane.
fn all_regions(width: usize, height: usize) -> Vec<Region> {
    let mut out = Vec::new();
    for y in 0..height {
        for x in 0..width {
            for h in 1..=height - y {
                for w in 1..=width - x {
                    out.push(Region::new(x, y, w, h));
                }
            }
        }
    }
    out
}

fn pixel_index_pattern(_plane: usize, x: usize, y: usize, bin: usize) -> u16 {
    ((y * 4 + x) * 2 + bin + 1) as u16
}

#[test]
fn test_end_to_end_region_raw_and_merged() {
    let builder = SdtBuilder::new(4, 2, 2).with_pattern(pixel_index_pattern);
    let (record, mut cursor) = open(builder.build().unwrap());
    assert_eq!(record.layout, BlockLayout::Standard);

    let region = Region::new(1, 0, 2, 2);
    let decoded = decode(&record, &mut cursor, 0, region).unwrap();

    // Pixels (1,0) (2,0) (1,1) (2,1), two little-endian bins each.
    let expected_raw: Vec<u8> = [3u16, 4, 5, 6, 11, 12, 13, 14]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    assert_eq!(decoded.data, expected_raw);
    assert_eq!(decoded.data.len(), 2 * 2 * 2 * 2);

    let merged = IntensityMerger::merge(&decoded).unwrap();
    let expected_merged: Vec<u8> = [7u16, 11, 23, 27]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    assert_eq!(merged.data, expected_merged);
    assert_eq!(merged.region, region);
}

#[test]
fn test_merge_wraps_decoded_counts() {
    let builder = SdtBuilder::new(4, 1, 2).with_pattern(|_, _, _, _| 40000);
    let (record, mut cursor) = open(builder.build().unwrap());
    let decoded = decode(&record, &mut cursor, 0, Region::new(0, 0, 4, 1)).unwrap();
    let merged = IntensityMerger::merge(&decoded).unwrap();
    for pixel in merged.data.chunks_exact(2) {
        assert_eq!(u16::from_le_bytes([pixel[0], pixel[1]]), 14464);
    }
}

fn assert_crop_round_trip(builder: &SdtBuilder) {
    let (record, mut cursor) = open(builder.build().unwrap());
    for plane in 0..builder.channels {
        let full_region = Region::new(0, 0, builder.width, builder.height);
        let full = decode(&record, &mut cursor, plane, full_region).unwrap();
        for region in all_regions(builder.width, builder.height) {
            let direct = decode(&record, &mut cursor, plane, region).unwrap();
            let cropped = full.crop(&region).unwrap();
            assert_eq!(direct, cropped, "plane {} region {:?}", plane, region);
        }
    }
}

#[test]
fn test_geometry_round_trip_standard() {
    assert_crop_round_trip(&SdtBuilder::new(5, 3, 3).with_channels(2));
}

#[test]
fn test_geometry_round_trip_chained_per_plane() {
    assert_crop_round_trip(
        &SdtBuilder::new(6, 2, 2)
            .with_channels(4)
            .with_layout(BlockLayout::ChainedPerPlane)
            .with_block_count(2),
    );
}

#[test]
fn test_chained_per_pixel_matches_standard() {
    let standard = SdtBuilder::new(3, 3, 4).with_channels(3);
    let streamed = standard.clone().with_layout(BlockLayout::ChainedPerPixel);
    let (std_record, mut std_cursor) = open(standard.build().unwrap());
    let (px_record, mut px_cursor) = open(streamed.build().unwrap());
    assert_eq!(px_record.layout, BlockLayout::ChainedPerPixel);

    for plane in 0..3 {
        for region in [Region::new(0, 0, 3, 3), Region::new(1, 0, 2, 2), Region::new(2, 2, 1, 1)] {
            let expected = decode(&std_record, &mut std_cursor, plane, region).unwrap();
            let actual = decode(&px_record, &mut px_cursor, plane, region).unwrap();
            assert_eq!(actual, expected, "plane {} region {:?}", plane, region);
        }
    }
}

#[test]
fn test_compressed_blocks_match_uncompressed() {
    for layout in [BlockLayout::Standard, BlockLayout::ChainedPerPlane] {
        let plain = SdtBuilder::new(5, 2, 3)
            .with_channels(4)
            .with_layout(layout)
            .with_block_count(2);
        let packed = plain.clone().with_compression(true);
        let (plain_record, mut plain_cursor) = open(plain.build().unwrap());
        let (packed_record, mut packed_cursor) = open(packed.build().unwrap());
        assert!(packed_record.is_compressed());

        for plane in 0..4 {
            let region = Region::new(1, 1, 3, 1);
            assert_eq!(
                decode(&packed_record, &mut packed_cursor, plane, region).unwrap(),
                decode(&plain_record, &mut plain_cursor, plane, region).unwrap(),
                "{} plane {}",
                layout,
                plane
            );
        }
    }
}

#[test]
fn test_compressed_per_pixel_is_unsupported() {
    let builder = SdtBuilder::new(2, 2, 2)
        .with_layout(BlockLayout::ChainedPerPixel)
        .with_compression(true);
    let (record, mut cursor) = open(builder.build().unwrap());
    let err = decode(&record, &mut cursor, 0, Region::new(0, 0, 1, 1)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedLayout(_)), "{err}");
}

#[test]
fn test_per_pixel_chain_shorter_than_plane() {
    let builder = SdtBuilder::new(3, 2, 2).with_layout(BlockLayout::ChainedPerPixel);
    let mut bytes = builder.build().unwrap();
    patch_header(&mut bytes, |h| h.no_of_data_blocks = 4);
    let (record, mut cursor) = open(bytes);

    let err = decode(&record, &mut cursor, 0, Region::new(0, 0, 1, 1)).unwrap_err();
    assert!(matches!(err, Error::ChainTraversal { hop: 4, .. }), "{err}");
}

#[test]
fn test_fifo_plane_beyond_chain() {
    // Five planes over two blocks: plane 4 would need a third block.
    let builder = SdtBuilder::new(4, 1, 1)
        .with_channels(5)
        .with_layout(BlockLayout::ChainedPerPlane)
        .with_block_count(2);
    let (record, mut cursor) = open(builder.build().unwrap());

    let err = decode(&record, &mut cursor, 4, Region::new(0, 0, 4, 1)).unwrap_err();
    assert!(matches!(err, Error::ChainTraversal { .. }), "{err}");
    // Other planes still decode.
    assert!(decode(&record, &mut cursor, 3, Region::new(0, 0, 4, 1)).is_ok());
}

#[test]
fn test_truncated_plane_is_reported() {
    let builder = SdtBuilder::new(4, 4, 2);
    let mut bytes = builder.build().unwrap();
    bytes.truncate(bytes.len() - 3);
    let (record, mut cursor) = open(bytes);

    let err = decode(&record, &mut cursor, 0, Region::new(0, 0, 4, 4)).unwrap_err();
    match err {
        Error::TruncatedRead { expected, actual, .. } => {
            assert_eq!(expected, 4 * 2 * 2);
            assert_eq!(actual, 4 * 2 * 2 - 3);
        }
        other => panic!("expected truncated read, got {other}"),
    }

    // Rows before the cut are unaffected.
    let top = decode(&record, &mut cursor, 0, Region::new(0, 0, 4, 2)).unwrap();
    let expected = vec![builder.sample(0, 1, 1, 0), builder.sample(0, 1, 1, 1)];
    assert_eq!(top.histogram_u16(1, 1), Some(expected));
}

#[test]
fn test_short_final_fifo_block_is_bounded() {
    // Two planes per block, but the last block declares room for only one.
    let builder = SdtBuilder::new(4, 1, 1)
        .with_channels(4)
        .with_layout(BlockLayout::ChainedPerPlane)
        .with_block_count(2);
    let mut bytes = builder.build().unwrap();
    let plane_bytes = 4 * 2;
    let second = builder.data_block_offset() + BLOCK_HEADER_SIZE + 2 * plane_bytes;
    // block_length is the last field of the block header
    let length_at = second + BLOCK_HEADER_SIZE - 4;
    bytes[length_at..length_at + 4].copy_from_slice(&(plane_bytes as u32).to_le_bytes());
    let (record, mut cursor) = open(bytes);

    let err = decode(&record, &mut cursor, 3, Region::new(0, 0, 4, 1)).unwrap_err();
    match err {
        Error::TruncatedRead {
            offset,
            expected,
            actual,
        } => {
            assert_eq!(offset, (second + BLOCK_HEADER_SIZE + plane_bytes) as u64);
            assert_eq!(expected, plane_bytes);
            assert_eq!(actual, 0);
        }
        other => panic!("expected truncated read, got {other}"),
    }

    let plane = decode(&record, &mut cursor, 2, Region::new(1, 0, 2, 1)).unwrap();
    assert_eq!(plane.histogram_u16(0, 0), Some(vec![builder.sample(2, 1, 0, 0)]));
}
