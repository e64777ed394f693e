//! Byte source helpers shared by the parser and the decoder.

use crate::{Error, Result};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

/// Reads until `buf` is full or the source is exhausted.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fills `buf` from the current position.
///
/// A short read is reported as [`Error::TruncatedRead`]; the buffer is
/// never padded.
pub(crate) fn read_exact<R: Read + Seek>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let offset = reader.stream_position()?;
    let actual = read_fully(reader, buf)?;
    if actual < buf.len() {
        return Err(Error::TruncatedRead {
            offset,
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// Seeks to `offset` and fills `buf`.
pub(crate) fn read_exact_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    read_exact(reader, buf)
}

/// Reads up to `len` bytes at `offset`, returning fewer at end of stream.
pub(crate) fn read_up_to_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    let n = read_fully(reader, &mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Moves the position forward by `n` bytes.
pub(crate) fn skip<R: Seek>(reader: &mut R, n: usize) -> Result<()> {
    if n > 0 {
        let n = i64::try_from(n).map_err(|_| {
            Error::UnsupportedLayout(format!("skip of {n} bytes exceeds seek range"))
        })?;
        reader.seek(SeekFrom::Current(n))?;
    }
    Ok(())
}

/// Copies a record into a zeroed buffer of its full size.
///
/// Older software revisions wrote shorter records; their missing trailing
/// fields read as zero. Bytes past `N` are ignored.
pub(crate) fn padded_record<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut record = [0u8; N];
    let n = bytes.len().min(N);
    record[..n].copy_from_slice(&bytes[..n]);
    record
}

/// Reads a fixed-width, NUL-terminated text field.
pub(crate) fn read_text<R: Read>(reader: &mut R, len: usize) -> io::Result<String> {
    let mut field = vec![0u8; len];
    reader.read_exact(&mut field)?;
    Ok(fixed_text(&field))
}

/// Writes a fixed-width text field, NUL padded and truncated to `len`.
pub(crate) fn write_text<W: Write>(writer: &mut W, value: &str, len: usize) -> io::Result<()> {
    let mut field = vec![0u8; len];
    let n = value.len().min(len.saturating_sub(1));
    field[..n].copy_from_slice(&value.as_bytes()[..n]);
    writer.write_all(&field)
}

/// Decodes a NUL-terminated ASCII field, trimming trailing blanks.
fn fixed_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_exact_reports_truncation() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        let mut buf = [0u8; 4];
        let err = read_exact_at(&mut cursor, 2, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedRead {
                offset: 2,
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_skip_moves_forward() {
        let mut cursor = Cursor::new(vec![0u8, 1, 2, 3, 4, 5]);
        skip(&mut cursor, 4).unwrap();
        let mut buf = [0u8; 2];
        read_exact(&mut cursor, &mut buf).unwrap();
        assert_eq!(buf, [4, 5]);
    }

    #[test]
    fn test_padded_record() {
        let short: [u8; 4] = padded_record(&[1, 2]);
        assert_eq!(short, [1, 2, 0, 0]);
        let long: [u8; 2] = padded_record(&[1, 2, 3, 4]);
        assert_eq!(long, [1, 2]);
    }

    #[test]
    fn test_text_field_roundtrip() {
        let mut bytes = Vec::new();
        write_text(&mut bytes, "SPC-830", 16).unwrap();
        write_text(&mut bytes, "too long for field", 4).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[16..], b"too\0");

        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_text(&mut cursor, 16).unwrap(), "SPC-830");
        assert_eq!(read_text(&mut cursor, 4).unwrap(), "too");
        assert!(read_text(&mut cursor, 1).is_err());
    }

    #[test]
    fn test_fixed_text() {
        assert_eq!(fixed_text(b"13:22:14\0"), "13:22:14");
        assert_eq!(fixed_text(b"SPC-830   \0\0junk"), "SPC-830");
        assert_eq!(fixed_text(b""), "");
    }
}
