//! Compressed block payloads.
//!
//! A compressed block holds a zip archive with a single entry. Only the
//! local file header of that entry is needed; the central directory is
//! never consulted.

use crate::{Error, Result};
use flate2::read::DeflateDecoder;
use flate2::Crc;
use std::io::Read;

const LOCAL_FILE_SIGNATURE: u32 = 0x0403_4B50;
const LOCAL_HEADER_SIZE: usize = 30;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Fixed part of a zip local file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalEntry {
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    data_start: usize,
}

impl LocalEntry {
    fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < LOCAL_HEADER_SIZE {
            return Err(Error::Decompression(format!(
                "payload of {} bytes is shorter than an entry header",
                payload.len()
            )));
        }
        let u16_at = |i: usize| u16::from_le_bytes([payload[i], payload[i + 1]]);
        let u32_at = |i: usize| {
            u32::from_le_bytes([payload[i], payload[i + 1], payload[i + 2], payload[i + 3]])
        };

        let signature = u32_at(0);
        if signature != LOCAL_FILE_SIGNATURE {
            return Err(Error::Decompression(format!(
                "bad entry signature {signature:#010x}"
            )));
        }
        let name_len = usize::from(u16_at(26));
        let extra_len = usize::from(u16_at(28));
        Ok(Self {
            flags: u16_at(6),
            method: u16_at(8),
            crc32: u32_at(14),
            compressed_size: u32_at(18),
            uncompressed_size: u32_at(22),
            data_start: LOCAL_HEADER_SIZE + name_len + extra_len,
        })
    }

    /// Sizes and CRC are only valid when no trailing data descriptor is used.
    fn sizes_known(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR == 0
    }
}

/// Unpacks the single entry of a compressed block payload.
///
/// # Errors
/// Returns [`Error::Decompression`] for a malformed container, an
/// unsupported compression method, or a size/CRC mismatch.
pub fn decompress_block(payload: &[u8]) -> Result<Vec<u8>> {
    let entry = LocalEntry::parse(payload)?;
    let body = payload.get(entry.data_start..).ok_or_else(|| {
        Error::Decompression("entry name runs past the end of the payload".to_string())
    })?;
    let body = if entry.sizes_known() {
        body.get(..entry.compressed_size as usize).ok_or_else(|| {
            Error::Decompression(format!(
                "entry declares {} compressed bytes, payload holds {}",
                entry.compressed_size,
                body.len()
            ))
        })?
    } else {
        body
    };

    let data = match entry.method {
        METHOD_STORED => body.to_vec(),
        METHOD_DEFLATE => {
            let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
            DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompression(format!("inflate failed: {e}")))?;
            out
        }
        other => {
            return Err(Error::Decompression(format!(
                "unsupported compression method {other}"
            )))
        }
    };

    if entry.sizes_known() {
        if data.len() != entry.uncompressed_size as usize {
            return Err(Error::Decompression(format!(
                "entry inflated to {} bytes, header declares {}",
                data.len(),
                entry.uncompressed_size
            )));
        }
        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(Error::Decompression(format!(
                "CRC mismatch: computed {:#010x}, header declares {:#010x}",
                crc.sum(),
                entry.crc32
            )));
        }
    }
    Ok(data)
}

/// Wraps `data` in a single-entry container, deflated.
///
/// Produces what [`decompress_block`] accepts; used to build compressed
/// fixtures.
///
/// # Errors
/// Returns an I/O error if compression fails.
pub fn compress_block(name: &str, data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut crc = Crc::new();
    crc.update(data);
    let too_large = |_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "entry too large");

    let mut out = Vec::with_capacity(LOCAL_HEADER_SIZE + name.len() + compressed.len());
    out.extend_from_slice(&LOCAL_FILE_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&METHOD_DEFLATE.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // mod time/date
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&u32::try_from(compressed.len()).map_err(too_large)?.to_le_bytes());
    out.extend_from_slice(&u32::try_from(data.len()).map_err(too_large)?.to_le_bytes());
    out.extend_from_slice(&u16::try_from(name.len()).map_err(too_large)?.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra length
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}
