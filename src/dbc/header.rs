//! WDBC file header parsing

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

/// WDBC file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DbcHeader {
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
}

impl DbcHeader {
    pub const MAGIC: [u8; 4] = *b"WDBC";
    pub const SIZE: usize = 20;

    /// Check for the WDBC signature
    pub fn is_wdbc(data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == Self::MAGIC
    }

    /// Parse header from data
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::TruncatedHeader(data.len()));
        }

        let mut cursor = Cursor::new(data);

        let mut signature = [0u8; 4];
        cursor.read_exact(&mut signature)?;
        if signature != Self::MAGIC {
            return Err(Error::BadSignature { found: signature });
        }

        // Fixed order: rows, columns, row width, string table length
        let record_count = cursor.read_u32::<LittleEndian>()?;
        let field_count = cursor.read_u32::<LittleEndian>()?;
        let record_size = cursor.read_u32::<LittleEndian>()?;
        let string_block_size = cursor.read_u32::<LittleEndian>()?;

        Ok(DbcHeader {
            record_count,
            field_count,
            record_size,
            string_block_size,
        })
    }

    /// Size of the record data section
    pub fn data_size(&self) -> u64 {
        self.record_count as u64 * self.record_size as u64
    }

    /// Minimum file length implied by the header
    pub fn expected_file_len(&self) -> u64 {
        Self::SIZE as u64 + self.data_size() + self.string_block_size as u64
    }

    pub fn string_block_offset(&self) -> u64 {
        Self::SIZE as u64 + self.data_size()
    }
}
