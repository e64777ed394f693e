//! Memory-mapped file readers.
//!

use crate::{Error, ReaderConfig, Result};
use flimsdt_core::{DecodedRegion, ImageShape, IntensityMerger, MetadataTable, PlaneRequest, Region};
use flimsdt_sdt::{BlockLayout, HeaderParser, HeaderRecord, RegionDecoder};
use log::{debug, info};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Arc<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            Error::MmapError(format!("{}: {e}", path.as_ref().display()))
        })?;
        Ok(Self {
            mmap: Arc::new(mmap),
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh seekable cursor over the mapping.
    ///
    /// Each concurrent reader takes its own cursor; the mapping itself is
    /// shared.
    #[must_use]
    pub fn cursor(&self) -> Cursor<&[u8]> {
        Cursor::new(self.as_bytes())
    }
}

/// Last full plane decoded from a chained-per-pixel file.
struct CachedPlane {
    plane_index: usize,
    plane: DecodedRegion,
}

/// An SDT file reader with memory-mapped I/O.
///
/// The header is parsed once at open. Every plane read decodes through a
/// fresh cursor, so reads never share stream position and a failed read
/// leaves the reader usable.
pub struct SdtFileReader {
    reader: MappedFileReader,
    header: HeaderRecord,
    config: ReaderConfig,
    shape: ImageShape,
    cache: Mutex<Option<CachedPlane>>,
}

impl SdtFileReader {
    /// Opens an SDT file with default configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its header is
    /// malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Opens an SDT file with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its header is
    /// malformed.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        if reader.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "{} is empty",
                reader.path().display()
            )));
        }

        let header = HeaderParser::with_config(config.parser.clone()).parse(&mut reader.cursor())?;
        let shape = header.shape().with_merge(config.merge_intensity);
        info!(
            "opened {} ({} bytes, {} planes)",
            reader.path().display(),
            reader.len(),
            header.plane_count()
        );

        Ok(Self {
            reader,
            header,
            config,
            shape,
            cache: Mutex::new(None),
        })
    }

    /// Parsed header of the file.
    #[must_use]
    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    /// Shape of the planes [`Self::read_plane`] returns.
    #[must_use]
    pub fn shape(&self) -> &ImageShape {
        &self.shape
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.header.plane_count()
    }

    /// Property table filled by the header parser.
    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.header.metadata
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Turns intensity merging on or off and re-derives the output shape.
    pub fn set_merge_intensity(&mut self, merge: bool) {
        self.config.merge_intensity = merge;
        self.shape = self.header.shape().with_merge(merge);
    }

    /// Reads `region` of plane `plane_index`, merged if configured.
    ///
    /// # Errors
    /// Returns an error for requests outside the file and for decode
    /// failures of this plane.
    pub fn read_plane(&self, plane_index: usize, region: Region) -> Result<DecodedRegion> {
        let raw = self.decode_raw(plane_index, region)?;
        if self.config.merge_intensity {
            Ok(IntensityMerger::merge(&raw)?)
        } else {
            Ok(raw)
        }
    }

    /// Reads all of plane `plane_index`.
    ///
    /// # Errors
    /// See [`Self::read_plane`].
    pub fn read_full_plane(&self, plane_index: usize) -> Result<DecodedRegion> {
        self.read_plane(plane_index, self.header.geometry.full_region())
    }

    /// Number of bytes [`Self::read_plane`] returns for `region`.
    ///
    /// # Errors
    /// Returns [`flimsdt_core::Error::InvalidRegion`] if `region` does not
    /// fit the plane.
    pub fn output_len(&self, region: &Region) -> Result<usize> {
        self.header.geometry.check_region(region)?;
        let bytes_per_pixel = self.shape.samples_per_pixel() * self.shape.bytes_per_sample;
        Ok(region.pixel_count() * bytes_per_pixel)
    }

    /// Reads `region` of plane `plane_index` into `out`.
    ///
    /// # Errors
    /// Returns [`flimsdt_core::Error::InvalidRegion`] for a region outside
    /// the plane, [`flimsdt_core::Error::BufferSize`] if `out` is not exactly
    /// [`Self::output_len`] bytes, otherwise as [`Self::read_plane`].
    pub fn read_plane_into(
        &self,
        plane_index: usize,
        region: Region,
        out: &mut [u8],
    ) -> Result<()> {
        let expected = self.output_len(&region)?;
        if out.len() != expected {
            return Err(flimsdt_core::Error::BufferSize {
                expected,
                actual: out.len(),
            }
            .into());
        }

        if self.config.merge_intensity || self.uses_cache() {
            let plane = self.read_plane(plane_index, region)?;
            out.copy_from_slice(&plane.data);
        } else {
            let request = PlaneRequest::new(plane_index, region);
            RegionDecoder::new(&self.header).decode_into(
                &mut self.reader.cursor(),
                &request,
                out,
            )?;
        }
        Ok(())
    }

    /// Reads the same region of several planes concurrently.
    ///
    /// Results are in the order of `planes`. Each plane decodes through its
    /// own cursor.
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub fn read_planes_parallel(
        &self,
        planes: &[usize],
        region: Region,
    ) -> Result<Vec<DecodedRegion>> {
        planes
            .par_iter()
            .map(|&plane_index| self.read_plane(plane_index, region))
            .collect()
    }

    fn uses_cache(&self) -> bool {
        self.config.cache_full_planes && self.header.layout == BlockLayout::ChainedPerPixel
    }

    fn decode_raw(&self, plane_index: usize, region: Region) -> Result<DecodedRegion> {
        let decoder = RegionDecoder::new(&self.header);
        let request = PlaneRequest::new(plane_index, region);
        if !self.uses_cache() {
            return Ok(decoder.decode(&mut self.reader.cursor(), &request)?);
        }

        // Validate before touching the cache so bad requests fail the same way.
        decoder.output_len(&request)?;
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref().filter(|c| c.plane_index == plane_index) {
                debug!("full-plane cache hit for plane {plane_index}");
                return Ok(cached.plane.crop(&region)?);
            }
        }

        let plane = decoder.decode_full_plane(&mut self.reader.cursor(), plane_index)?;
        let out = plane.crop(&region)?;
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedPlane {
            plane_index,
            plane,
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flimsdt_sdt::testing::SdtBuilder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mapped_file_reader() {
        let data: Vec<u8> = (0..64).collect();
        let file = write_file(&data);

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
    }

    #[test]
    fn test_sdt_reader_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            SdtFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_sdt_reader_malformed_header() {
        let file = write_file(&[0u8; 64]);
        assert!(matches!(
            SdtFileReader::open(file.path()),
            Err(Error::Sdt(flimsdt_sdt::Error::MalformedHeader(_)))
        ));
    }

    #[test]
    fn test_merge_toggle_rederives_shape() {
        let file = write_file(&SdtBuilder::new(4, 2, 3).build().unwrap());
        let mut reader = SdtFileReader::open(file.path()).unwrap();
        assert_eq!(reader.shape().plane_bytes(), 4 * 2 * 3 * 2);
        assert_eq!(reader.read_full_plane(0).unwrap().data.len(), 4 * 2 * 3 * 2);

        reader.set_merge_intensity(true);
        assert!(reader.shape().is_merged());
        assert_eq!(reader.shape().plane_bytes(), 4 * 2 * 2);
        assert_eq!(reader.read_full_plane(0).unwrap().data.len(), 4 * 2 * 2);

        reader.set_merge_intensity(false);
        assert_eq!(reader.shape().plane_bytes(), 4 * 2 * 3 * 2);
    }

    #[test]
    fn test_cache_reuses_decoded_plane() {
        let builder = SdtBuilder::new(3, 2, 2)
            .with_channels(2)
            .with_layout(BlockLayout::ChainedPerPixel);
        let file = write_file(&builder.build().unwrap());
        let config = ReaderConfig::new().with_cache_full_planes(true);
        let reader = SdtFileReader::open_with_config(file.path(), config).unwrap();

        let first = reader.read_plane(1, Region::new(0, 0, 2, 1)).unwrap();
        assert!(reader.cache.lock().unwrap().as_ref().is_some_and(|c| c.plane_index == 1));
        let second = reader.read_plane(1, Region::new(1, 1, 2, 1)).unwrap();
        assert_eq!(
            second.histogram_u16(0, 0),
            Some(vec![builder.sample(1, 1, 1, 0), builder.sample(1, 1, 1, 1)])
        );
        assert_eq!(
            first.histogram_u16(1, 0),
            Some(vec![builder.sample(1, 1, 0, 0), builder.sample(1, 1, 0, 1)])
        );
    }
}
