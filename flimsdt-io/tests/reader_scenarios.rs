#![allow(clippy::uninlined_format_args, clippy::cast_possible_truncation)]
use approx::assert_relative_eq;
use flimsdt_core::{Axis, Region};
use flimsdt_io::{Error, PlaneWriter, ReaderConfig, SdtFileReader};
use flimsdt_sdt::testing::SdtBuilder;
use flimsdt_sdt::BlockLayout;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_file(builder: &SdtBuilder) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&builder.build().unwrap()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_header_and_metadata() {
    let file = write_file(&SdtBuilder::new(8, 4, 16).with_channels(2));
    let reader = SdtFileReader::open(file.path()).unwrap();

    assert_eq!(reader.plane_count(), 2);
    assert_eq!(reader.header().layout, BlockLayout::Standard);
    assert_relative_eq!(reader.header().time_base_ns, 12.5, epsilon = 1e-6);
    assert_relative_eq!(reader.metadata().get_f64("time base").unwrap(), 12.5, epsilon = 1e-6);

    let shape = reader.shape();
    assert_eq!(shape.axis_length(Axis::Lifetime), Some(16));
    assert_eq!(shape.axis_length(Axis::X), Some(8));
    assert_eq!(shape.axis_length(Axis::Y), Some(4));
    let calibration = shape.lifetime_calibration().unwrap();
    assert_eq!(calibration.unit, "ns");
    assert_relative_eq!(calibration.scale, 12.5 / 16.0, epsilon = 1e-9);
}

#[test]
fn test_parallel_reads_match_sequential() {
    for layout in [
        BlockLayout::Standard,
        BlockLayout::ChainedPerPlane,
        BlockLayout::ChainedPerPixel,
    ] {
        let builder = SdtBuilder::new(5, 3, 4)
            .with_channels(4)
            .with_layout(layout)
            .with_block_count(2);
        let file = write_file(&builder);
        let reader = SdtFileReader::open(file.path()).unwrap();

        let region = Region::new(1, 1, 3, 2);
        let planes = [3, 0, 2, 1];
        let parallel = reader.read_planes_parallel(&planes, region).unwrap();
        for (plane, decoded) in planes.iter().zip(&parallel) {
            let sequential = reader.read_plane(*plane, region).unwrap();
            assert_eq!(decoded, &sequential, "{} plane {}", layout, plane);
            assert_eq!(
                decoded.histogram_u16(0, 0).unwrap()[3],
                builder.sample(*plane, 1, 1, 3)
            );
        }
    }
}

#[test]
fn test_merged_reads() {
    let builder = SdtBuilder::new(4, 2, 2).with_pattern(|_, x, _, bin| {
        if bin == 0 {
            40000
        } else {
            ((x * 30000) % 65536) as u16
        }
    });
    let file = write_file(&builder);
    let config = ReaderConfig::new().with_merge_intensity(true);
    let reader = SdtFileReader::open_with_config(file.path(), config).unwrap();

    let plane = reader.read_full_plane(0).unwrap();
    assert_eq!(plane.time_bins, 1);
    let values: Vec<u16> = plane
        .data
        .chunks_exact(2)
        .map(|s| u16::from_le_bytes([s[0], s[1]]))
        .collect();
    // 40000 + 30000 * x, wrapped to 16 bits
    assert_eq!(&values[..4], &[40000, 4464, 34464, 64464]);
}

#[test]
fn test_read_plane_into() {
    let builder = SdtBuilder::new(4, 2, 3);
    let file = write_file(&builder);
    let mut reader = SdtFileReader::open(file.path()).unwrap();
    let region = Region::new(1, 0, 2, 2);

    let mut out = vec![0u8; reader.output_len(&region).unwrap()];
    assert_eq!(out.len(), 2 * 2 * 3 * 2);
    reader.read_plane_into(0, region, &mut out).unwrap();
    assert_eq!(out, reader.read_plane(0, region).unwrap().data);

    let mut short = vec![0u8; out.len() - 1];
    let err = reader.read_plane_into(0, region, &mut short).unwrap_err();
    assert!(matches!(err, Error::Core(flimsdt_core::Error::BufferSize { .. })), "{err}");

    reader.set_merge_intensity(true);
    let mut merged = vec![0u8; reader.output_len(&region).unwrap()];
    assert_eq!(merged.len(), 2 * 2 * 2);
    reader.read_plane_into(0, region, &mut merged).unwrap();
    assert_eq!(merged, reader.read_plane(0, region).unwrap().data);
    assert_eq!(
        u16::from_le_bytes([merged[0], merged[1]]),
        (0..3).map(|bin| builder.sample(0, 1, 0, bin)).sum::<u16>()
    );
}

#[test]
fn test_out_of_range_region_is_an_error() {
    let file = write_file(&SdtBuilder::new(4, 2, 2).with_channels(2));
    let reader = SdtFileReader::open(file.path()).unwrap();

    let huge = Region::new(0, 0, usize::MAX, 2);
    assert!(matches!(
        reader.output_len(&huge),
        Err(Error::Core(flimsdt_core::Error::InvalidRegion { .. }))
    ));
    let mut out = vec![0u8; 16];
    let err = reader.read_plane_into(0, huge, &mut out).unwrap_err();
    assert!(matches!(err, Error::Core(flimsdt_core::Error::InvalidRegion { .. })), "{err}");

    let past_edge = Region::new(3, 0, 2, 1);
    assert!(reader.read_plane_into(0, past_edge, &mut out).is_err());
    assert!(reader.read_plane(0, past_edge).is_err());
    assert_eq!(reader.output_len(&Region::new(2, 0, 2, 1)).unwrap(), 2 * 2 * 2);
}

#[test]
fn test_region_as_array() {
    let builder = SdtBuilder::new(5, 3, 4).with_channels(2);
    let file = write_file(&builder);
    let reader = SdtFileReader::open(file.path()).unwrap();

    let array = reader
        .read_plane(1, Region::new(1, 1, 3, 2))
        .unwrap()
        .to_array()
        .unwrap();
    assert_eq!(array.shape(), &[2, 3, 4]);
    assert_eq!(array[[0, 0, 0]], builder.sample(1, 1, 1, 0));
    assert_eq!(array[[1, 2, 3]], builder.sample(1, 3, 2, 3));
}

#[test]
fn test_errors_are_local_to_the_request() {
    let file = write_file(&SdtBuilder::new(4, 2, 2).with_channels(2));
    let reader = SdtFileReader::open(file.path()).unwrap();

    let err = reader.read_plane(5, Region::new(0, 0, 1, 1)).unwrap_err();
    assert!(matches!(err, Error::Sdt(flimsdt_sdt::Error::InvalidPlane { index: 5, count: 2 })));
    assert!(reader.read_plane(1, Region::new(0, 0, 1, 1)).is_ok());
}

#[test]
fn test_compressed_file() {
    let plain = SdtBuilder::new(6, 3, 2).with_channels(2);
    let packed = plain.clone().with_compression(true);
    let plain_file = write_file(&plain);
    let packed_file = write_file(&packed);

    let a = SdtFileReader::open(plain_file.path()).unwrap();
    let b = SdtFileReader::open(packed_file.path()).unwrap();
    assert!(b.header().is_compressed());
    assert_eq!(a.read_full_plane(1).unwrap(), b.read_full_plane(1).unwrap());
}

#[test]
fn test_lenient_checksum_from_config_file() {
    let mut bytes = SdtBuilder::new(4, 2, 2).build().unwrap();
    bytes[40] ^= 0xFF;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    assert!(SdtFileReader::open(file.path()).is_err());

    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, r#"{{ "parser": {{ "verify_checksum": false }} }}"#).unwrap();
    config_file.flush().unwrap();
    let config = ReaderConfig::from_file(config_file.path()).unwrap();
    assert!(SdtFileReader::open_with_config(file.path(), config).is_ok());
}

#[test]
fn test_export_region_csv() {
    let builder = SdtBuilder::new(4, 2, 2);
    let file = write_file(&builder);
    let reader = SdtFileReader::open(file.path()).unwrap();
    let region = reader.read_plane(0, Region::new(3, 1, 1, 1)).unwrap();

    let out = NamedTempFile::new().unwrap();
    PlaneWriter::create(out.path()).unwrap().write_csv(&region).unwrap();
    let content = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(
        content,
        format!(
            "x,y,bin,count\n3,1,0,{}\n3,1,1,{}\n",
            builder.sample(0, 3, 1, 0),
            builder.sample(0, 3, 1, 1)
        )
    );
}
