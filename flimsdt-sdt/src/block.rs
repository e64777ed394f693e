//! Data block headers and block chain traversal.

use crate::stream::read_exact_at;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flimsdt_core::MetadataTable;
use log::debug;
use std::io::{self, Cursor, Read, Seek};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of a data block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 22;

/// Block type bit marking a compressed payload.
pub const BLOCK_COMPRESSED: u16 = 0x1000;

/// Kind of data a block holds (`block_type & 0x00F0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockContent {
    Decay,
    Page,
    Fcs,
    Fida,
    Filda,
    Mcs,
    Image,
    McsTa,
    ImageMcs,
    Other(u8),
}

/// Decoded `block_type` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockType(pub u16);

impl BlockType {
    /// How the data was created (measurement, calculation, ...).
    #[must_use]
    pub fn creation_mode(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    #[must_use]
    pub fn content(self) -> BlockContent {
        match (self.0 & 0x00F0) >> 4 {
            0x0 => BlockContent::Decay,
            0x1 => BlockContent::Page,
            0x2 => BlockContent::Fcs,
            0x3 => BlockContent::Fida,
            0x4 => BlockContent::Filda,
            0x5 => BlockContent::Mcs,
            0x6 => BlockContent::Image,
            0x7 => BlockContent::McsTa,
            0x8 => BlockContent::ImageMcs,
            other => BlockContent::Other(other as u8),
        }
    }

    /// Bytes per histogram sample, or `None` for non-integer formats.
    #[must_use]
    pub fn bytes_per_sample(self) -> Option<usize> {
        match self.0 & 0x0F00 {
            0x000 => Some(2),
            0x100 => Some(4),
            _ => None,
        }
    }

    /// True if the payload is a compressed container.
    #[must_use]
    pub fn is_compressed(self) -> bool {
        self.0 & BLOCK_COMPRESSED != 0
    }
}

/// Header preceding every data block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockHeader {
    pub block_no: i16,
    /// Offset of this block's data as recorded by the writer.
    pub data_offs: i32,
    /// Offset of the next block header; zero at the end of the chain.
    pub next_block_offs: i32,
    pub block_type: BlockType,
    pub meas_desc_block_no: i16,
    pub lblock_no: u32,
    /// Payload length in bytes (compressed length for compressed blocks).
    pub block_length: u32,
}

impl BlockHeader {
    /// Reads a header from the current position of `reader`.
    ///
    /// # Errors
    /// Returns an I/O error if the stream ends inside the header.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            block_no: reader.read_i16::<LittleEndian>()?,
            data_offs: reader.read_i32::<LittleEndian>()?,
            next_block_offs: reader.read_i32::<LittleEndian>()?,
            block_type: BlockType(reader.read_u16::<LittleEndian>()?),
            meas_desc_block_no: reader.read_i16::<LittleEndian>()?,
            lblock_no: reader.read_u32::<LittleEndian>()?,
            block_length: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Decodes a header from its on-disk bytes.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the record cannot be read.
    pub fn from_bytes(bytes: &[u8; BLOCK_HEADER_SIZE]) -> Result<Self> {
        Ok(Self::read(&mut Cursor::new(&bytes[..]))?)
    }

    /// Encodes the header into its on-disk bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut out = [0u8; BLOCK_HEADER_SIZE];
        LittleEndian::write_i16(&mut out[0..2], self.block_no);
        LittleEndian::write_i32(&mut out[2..6], self.data_offs);
        LittleEndian::write_i32(&mut out[6..10], self.next_block_offs);
        LittleEndian::write_u16(&mut out[10..12], self.block_type.0);
        LittleEndian::write_i16(&mut out[12..14], self.meas_desc_block_no);
        LittleEndian::write_u32(&mut out[14..18], self.lblock_no);
        LittleEndian::write_u32(&mut out[18..22], self.block_length);
        out
    }

    /// Reads the header stored at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedRead`] if the stream ends inside the header.
    pub fn read_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        read_exact_at(reader, offset, &mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Offset of the next block, or `None` at the end of the chain.
    #[must_use]
    pub fn next_offset(&self) -> Option<u64> {
        u64::try_from(self.next_block_offs).ok().filter(|&o| o > 0)
    }

    pub fn fill_metadata(&self, table: &mut MetadataTable) {
        const P: &str = "BHFileBlockHeader.";
        table.insert(format!("{P}blockNo"), self.block_no);
        table.insert(format!("{P}dataOffs"), self.data_offs);
        table.insert(format!("{P}nextBlockOffs"), self.next_block_offs);
        table.insert(format!("{P}blockType"), self.block_type.0);
        table.insert(format!("{P}measDescBlockNo"), self.meas_desc_block_no);
        table.insert(format!("{P}lblockNo"), self.lblock_no);
        table.insert(format!("{P}blockLength"), self.block_length);
    }
}

/// A block reached through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedBlock {
    /// Position in the chain, zero for the first block.
    pub index: usize,
    /// Offset of the block header.
    pub header_offset: u64,
    pub header: BlockHeader,
}

impl LocatedBlock {
    /// Offset of the first payload byte, right after the header.
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        self.header_offset + BLOCK_HEADER_SIZE as u64
    }
}

/// Cursor over a singly-linked chain of data blocks.
///
/// Yields at most `block_count` blocks, so a corrupt chain that loops back
/// on itself ends with [`Error::ChainTraversal`] instead of spinning.
#[derive(Debug, Clone)]
pub struct BlockChain {
    next: Option<u64>,
    last_offset: u64,
    visited: usize,
    block_count: usize,
}

impl BlockChain {
    /// Starts a chain whose first header is at `start_offset`.
    #[must_use]
    pub fn new(start_offset: u64, block_count: u32) -> Self {
        Self {
            next: Some(start_offset),
            last_offset: start_offset,
            visited: 0,
            block_count: block_count as usize,
        }
    }

    /// Number of blocks visited so far.
    #[must_use]
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Reads the next block of the chain.
    ///
    /// # Errors
    /// Returns [`Error::ChainTraversal`] when the previous block has no
    /// successor or the declared block count is exhausted.
    pub fn next_block<R: Read + Seek>(&mut self, reader: &mut R) -> Result<LocatedBlock> {
        if self.visited >= self.block_count {
            return Err(Error::ChainTraversal {
                hop: self.visited,
                offset: self.last_offset,
                reason: format!("chain exceeds declared block count {}", self.block_count),
            });
        }
        let Some(offset) = self.next else {
            return Err(Error::ChainTraversal {
                hop: self.visited,
                offset: self.last_offset,
                reason: "next block offset missing".to_string(),
            });
        };

        let header = BlockHeader::read_at(reader, offset)?;
        let block = LocatedBlock {
            index: self.visited,
            header_offset: offset,
            header,
        };
        self.next = block.header.next_offset();
        self.last_offset = offset;
        self.visited += 1;
        Ok(block)
    }
}

/// Walks `chain_index` hops from the block at `start_offset`.
///
/// # Errors
/// Returns [`Error::ChainTraversal`] if the chain ends early or the target
/// lies beyond `block_count` blocks.
pub fn locate_block<R: Read + Seek>(
    reader: &mut R,
    start_offset: u64,
    chain_index: usize,
    block_count: u32,
) -> Result<LocatedBlock> {
    let mut chain = BlockChain::new(start_offset, block_count);
    loop {
        let block = chain.next_block(reader)?;
        if block.index == chain_index {
            debug!(
                "located block {} at offset {} (type {:#06x})",
                chain_index, block.header_offset, block.header.block_type.0
            );
            return Ok(block);
        }
    }
}
