//! The fixed 42-byte SDT file header.

use crate::Result;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flimsdt_core::MetadataTable;
use std::io::{self, Cursor, Read};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the primary file header in bytes.
pub const FILE_HEADER_SIZE: usize = 42;

/// `header_valid` marker of a completely written file.
pub const HEADER_VALID: u16 = 0x5555;

/// `header_valid` marker of a file whose header was never finalized.
pub const HEADER_NOT_VALID: u16 = 0x1111;

/// Wrapping sum of all header words in a file with a correct checksum.
pub const HEADER_CHECKSUM: u16 = 0x55AA;

/// `no_of_data_blocks` value meaning the real count is in `reserved1`.
pub const LONG_BLOCK_COUNT_MARKER: i16 = 0x7FFF;

/// Primary SDT file header, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileHeader {
    /// Software revision and module type code.
    pub revision: i16,
    /// Offset of the identification text block.
    pub info_offs: i32,
    pub info_length: i16,
    /// Offset of the setup block.
    pub setup_offs: i32,
    pub setup_length: i16,
    /// Offset of the first data block header.
    pub data_block_offs: i32,
    pub no_of_data_blocks: i16,
    pub data_block_length: i32,
    /// Offset of the first measurement description block.
    pub meas_desc_block_offs: i32,
    pub no_of_meas_desc_blocks: i16,
    pub meas_desc_block_length: i16,
    pub header_valid: u16,
    /// Long data block count for files with more than 0x7FFE blocks.
    pub reserved1: u32,
    pub reserved2: u16,
    pub chksum: u16,
}

impl FileHeader {
    /// Reads the header from the current position of `reader`.
    ///
    /// # Errors
    /// Returns an I/O error if the stream ends inside the header.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            revision: reader.read_i16::<LittleEndian>()?,
            info_offs: reader.read_i32::<LittleEndian>()?,
            info_length: reader.read_i16::<LittleEndian>()?,
            setup_offs: reader.read_i32::<LittleEndian>()?,
            setup_length: reader.read_i16::<LittleEndian>()?,
            data_block_offs: reader.read_i32::<LittleEndian>()?,
            no_of_data_blocks: reader.read_i16::<LittleEndian>()?,
            data_block_length: reader.read_i32::<LittleEndian>()?,
            meas_desc_block_offs: reader.read_i32::<LittleEndian>()?,
            no_of_meas_desc_blocks: reader.read_i16::<LittleEndian>()?,
            meas_desc_block_length: reader.read_i16::<LittleEndian>()?,
            header_valid: reader.read_u16::<LittleEndian>()?,
            reserved1: reader.read_u32::<LittleEndian>()?,
            reserved2: reader.read_u16::<LittleEndian>()?,
            chksum: reader.read_u16::<LittleEndian>()?,
        })
    }

    /// Decodes the header from its on-disk bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the record cannot be read.
    pub fn from_bytes(bytes: &[u8; FILE_HEADER_SIZE]) -> Result<Self> {
        Ok(Self::read(&mut Cursor::new(&bytes[..]))?)
    }

    /// Encodes the header into its on-disk bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut out = [0u8; FILE_HEADER_SIZE];
        LittleEndian::write_i16(&mut out[0..2], self.revision);
        LittleEndian::write_i32(&mut out[2..6], self.info_offs);
        LittleEndian::write_i16(&mut out[6..8], self.info_length);
        LittleEndian::write_i32(&mut out[8..12], self.setup_offs);
        LittleEndian::write_i16(&mut out[12..14], self.setup_length);
        LittleEndian::write_i32(&mut out[14..18], self.data_block_offs);
        LittleEndian::write_i16(&mut out[18..20], self.no_of_data_blocks);
        LittleEndian::write_i32(&mut out[20..24], self.data_block_length);
        LittleEndian::write_i32(&mut out[24..28], self.meas_desc_block_offs);
        LittleEndian::write_i16(&mut out[28..30], self.no_of_meas_desc_blocks);
        LittleEndian::write_i16(&mut out[30..32], self.meas_desc_block_length);
        LittleEndian::write_u16(&mut out[32..34], self.header_valid);
        LittleEndian::write_u32(&mut out[34..38], self.reserved1);
        LittleEndian::write_u16(&mut out[38..40], self.reserved2);
        LittleEndian::write_u16(&mut out[40..42], self.chksum);
        out
    }

    /// Wrapping sum of every 16-bit word of the encoded header.
    ///
    /// Equals [`HEADER_CHECKSUM`] for a consistent header.
    #[must_use]
    pub fn word_sum(&self) -> u16 {
        self.to_bytes()
            .chunks_exact(2)
            .fold(0u16, |acc, w| acc.wrapping_add(LittleEndian::read_u16(w)))
    }

    /// True if the checksum field matches the rest of the header.
    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        self.word_sum() == HEADER_CHECKSUM
    }

    /// Checksum value that makes the header consistent.
    #[must_use]
    pub fn expected_checksum(&self) -> u16 {
        let without = self.word_sum().wrapping_sub(self.chksum);
        HEADER_CHECKSUM.wrapping_sub(without)
    }

    /// Number of data blocks, resolving the long-count encoding.
    #[must_use]
    pub fn data_block_count(&self) -> u32 {
        if self.no_of_data_blocks == LONG_BLOCK_COUNT_MARKER {
            self.reserved1
        } else {
            u32::try_from(self.no_of_data_blocks).unwrap_or(0)
        }
    }

    /// Adds the header fields to `table` under the `bhfileHeader.` prefix.
    pub fn fill_metadata(&self, table: &mut MetadataTable) {
        const P: &str = "bhfileHeader.";
        table.insert(format!("{P}revision"), self.revision);
        table.insert(format!("{P}infoOffs"), self.info_offs);
        table.insert(format!("{P}infoLength"), self.info_length);
        table.insert(format!("{P}setupOffs"), self.setup_offs);
        table.insert(format!("{P}setupLength"), self.setup_length);
        table.insert(format!("{P}dataBlockOffs"), self.data_block_offs);
        table.insert(format!("{P}noOfDataBlocks"), self.data_block_count());
        table.insert(format!("{P}dataBlockLength"), self.data_block_length);
        table.insert(format!("{P}measDescBlockOffs"), self.meas_desc_block_offs);
        table.insert(format!("{P}noOfMeasDescBlocks"), self.no_of_meas_desc_blocks);
        table.insert(format!("{P}measDescBlockLength"), self.meas_desc_block_length);
        table.insert(format!("{P}headerValid"), self.header_valid);
        table.insert(format!("{P}reserved1"), self.reserved1);
        table.insert(format!("{P}reserved2"), self.reserved2);
        table.insert(format!("{P}chksum"), self.chksum);
    }
}
