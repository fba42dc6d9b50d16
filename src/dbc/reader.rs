//! WDBC table decoder

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Seek, SeekFrom};
use std::ops::Index;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dbc::header::DbcHeader;
use crate::dbc::layout::FormatSpec;
use crate::dbc::types::{FieldType, FieldValue};
use crate::error::{Error, Result};

/// How a string field whose offset lies outside the string block is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOffsetPolicy {
    /// Decode to [`FieldValue::InvalidString`], keeping the rest of the record
    #[default]
    ErrorValue,
    /// Decode to the empty string
    Empty,
}

/// Options applied while decoding a table
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub string_offset_policy: StringOffsetPolicy,
}

/// One decoded row, values in canonical field order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field 0, the primary key by convention
    pub fn id(&self) -> Option<&FieldValue> {
        self.values.first()
    }
}

impl Index<usize> for Record {
    type Output = FieldValue;

    fn index(&self, index: usize) -> &FieldValue {
        &self.values[index]
    }
}

/// A fully decoded WDBC table
#[derive(Debug, Clone)]
pub struct DbcTable {
    name: String,
    /// Parsed header
    pub header: DbcHeader,
    layout: Arc<FormatSpec>,
    records: Vec<Record>,
    /// Number of string fields whose offset fell outside the string block
    bad_string_offsets: usize,
}

impl DbcTable {
    /// Decode a whole file image
    ///
    /// Any structural failure aborts the decode; only out-of-range string
    /// offsets are tolerated, according to `options.string_offset_policy`.
    pub fn parse(
        name: &str,
        data: &[u8],
        layout: Arc<FormatSpec>,
        options: &DecodeOptions,
    ) -> Result<Self> {
        let header = DbcHeader::parse(data)?;

        if header.field_count as usize != layout.field_count()
            || header.record_size as usize != layout.record_size()
        {
            return Err(Error::LayoutMismatch {
                expected_fields: layout.field_count() as u32,
                actual_fields: header.field_count,
                expected_size: layout.record_size() as u32,
                actual_size: header.record_size,
            });
        }

        // A zero-width layout cannot bound the record count by file length
        if header.record_size == 0 && header.record_count > 0 {
            return Err(Error::LayoutMismatch {
                expected_fields: layout.field_count() as u32,
                actual_fields: header.field_count,
                expected_size: layout.record_size() as u32,
                actual_size: header.record_size,
            });
        }

        let expected = header.expected_file_len();
        if (data.len() as u64) < expected {
            return Err(Error::TruncatedBody {
                expected,
                actual: data.len() as u64,
            });
        }

        let block_start = header.string_block_offset() as usize;
        let string_block = &data[block_start..block_start + header.string_block_size as usize];
        let record_size = header.record_size as usize;

        let capacity = (header.record_count as usize)
            .min((data.len() - DbcHeader::SIZE) / record_size.max(1));
        let mut records = Vec::with_capacity(capacity);
        let mut bad_string_offsets = 0usize;
        for i in 0..header.record_count as usize {
            let start = DbcHeader::SIZE + i * record_size;
            let bytes = &data[start..start + record_size];
            let record = Self::read_record(
                bytes,
                &layout,
                string_block,
                options,
                &mut bad_string_offsets,
            )?;
            records.push(record);
        }

        if bad_string_offsets > 0 {
            warn!(
                table = name,
                count = bad_string_offsets,
                "string offsets outside the string block"
            );
        }
        debug!(
            table = name,
            records = records.len(),
            fields = layout.field_count(),
            "decoded table"
        );

        Ok(DbcTable {
            name: name.to_string(),
            header,
            layout,
            records,
            bad_string_offsets,
        })
    }

    fn read_record(
        bytes: &[u8],
        layout: &FormatSpec,
        string_block: &[u8],
        options: &DecodeOptions,
        bad_string_offsets: &mut usize,
    ) -> Result<Record> {
        let mut cursor = Cursor::new(bytes);
        let mut values = Vec::with_capacity(layout.field_count());

        for tag in layout.tags() {
            let value = match tag {
                FieldType::Index | FieldType::SortedIndex | FieldType::Int | FieldType::Logical => {
                    FieldValue::UInt(cursor.read_u32::<LittleEndian>()?)
                }
                FieldType::Float => FieldValue::Float(cursor.read_f32::<LittleEndian>()?),
                FieldType::Byte => FieldValue::Byte(cursor.read_u8()?),
                FieldType::String => {
                    let offset = cursor.read_u32::<LittleEndian>()?;
                    match read_cstring(string_block, offset) {
                        Ok(s) => FieldValue::String(s),
                        Err(_) => {
                            *bad_string_offsets += 1;
                            match options.string_offset_policy {
                                StringOffsetPolicy::ErrorValue => {
                                    FieldValue::InvalidString { offset }
                                }
                                StringOffsetPolicy::Empty => FieldValue::String(String::new()),
                            }
                        }
                    }
                }
                FieldType::Skip | FieldType::SkipByte => {
                    cursor.seek(SeekFrom::Current(tag.byte_width() as i64))?;
                    continue;
                }
            };
            values.push(value);
        }

        Ok(Record::new(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &FormatSpec {
        &self.layout
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn field_count(&self) -> usize {
        self.layout.field_count()
    }

    pub fn bad_string_offsets(&self) -> usize {
        self.bad_string_offsets
    }
}

/// Read the null-terminated string at `offset` in the string block
///
/// Offset 0 is always the empty string. A string running to the end of the
/// block without a terminator is taken as-is.
pub fn read_cstring(block: &[u8], offset: u32) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let start = offset as usize;
    if start >= block.len() {
        return Err(Error::BadStringOffset {
            offset,
            size: block.len() as u32,
        });
    }

    let end = block[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| start + p)
        .unwrap_or(block.len());

    Ok(String::from_utf8_lossy(&block[start..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::testing::DbcBuilder;

    fn decode(data: &[u8], format: &str) -> Result<DbcTable> {
        let layout = Arc::new(FormatSpec::parse(format).unwrap());
        DbcTable::parse("Test", data, layout, &DecodeOptions::default())
    }

    #[test]
    fn test_decode_scenario_table() {
        let data = DbcBuilder::new(b"\0abc\0d\0")
            .record(|r| r.u32(10).u32(7).f32(1.5).u32(1).u32(5))
            .record(|r| r.u32(11).u32(8).f32(-2.0).u32(0).u32(1))
            .build();
        let table = decode(&data, "nifss").unwrap();

        assert_eq!(table.record_count(), 2);
        assert_eq!(table.header.record_size, 20);
        let first = &table.records()[0];
        assert_eq!(first.len(), 5);
        assert_eq!(first[0], FieldValue::UInt(10));
        assert_eq!(first[2], FieldValue::Float(1.5));
        assert_eq!(first[3], FieldValue::String("abc".into()));
        assert_eq!(first[4], FieldValue::String("d".into()));
        assert_eq!(table.records()[1][3], FieldValue::String(String::new()));
        assert_eq!(table.records()[1][4], FieldValue::String("abc".into()));
        assert_eq!(data.len() as u64, table.header.expected_file_len());
    }

    #[test]
    fn test_skip_and_byte_fields() {
        let data = DbcBuilder::new(b"\0")
            .fields(3)
            .record(|r| r.u32(1).u32(0xDEAD_BEEF).u8(9).u8(0xAA).u32(42))
            .build();
        let table = decode(&data, "nxbXi").unwrap();
        assert_eq!(
            table.records()[0].values(),
            &[FieldValue::UInt(1), FieldValue::Byte(9), FieldValue::UInt(42)]
        );
    }

    #[test]
    fn test_layout_mismatch_on_field_count() {
        let data = DbcBuilder::new(b"\0").record(|r| r.u32(1).u32(2)).build();
        match decode(&data, "nii") {
            Err(Error::LayoutMismatch {
                expected_fields,
                actual_fields,
                expected_size,
                actual_size,
            }) => {
                assert_eq!((expected_fields, actual_fields), (3, 2));
                assert_eq!((expected_size, actual_size), (12, 8));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_layout_mismatch_on_record_size() {
        // Same field count, different widths
        let data = DbcBuilder::new(b"\0").record(|r| r.u32(1).u32(2)).build();
        assert!(matches!(decode(&data, "nb"), Err(Error::LayoutMismatch { .. })));
    }

    #[test]
    fn test_truncated_body() {
        let mut data = DbcBuilder::new(b"\0abc\0")
            .record(|r| r.u32(1).u32(1))
            .build();
        data.truncate(data.len() - 2);
        match decode(&data, "ns") {
            Err(Error::TruncatedBody { expected, actual }) => {
                assert_eq!(expected, 20 + 8 + 5);
                assert_eq!(actual, 31);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bad_string_offset_error_value() {
        let data = DbcBuilder::new(b"\0ab\0")
            .record(|r| r.u32(1).u32(40))
            .record(|r| r.u32(2).u32(1))
            .build();
        let table = decode(&data, "ns").unwrap();
        assert_eq!(table.records()[0][1], FieldValue::InvalidString { offset: 40 });
        assert_eq!(table.records()[1][1], FieldValue::String("ab".into()));
        assert_eq!(table.bad_string_offsets(), 1);
    }

    #[test]
    fn test_bad_string_offset_empty_policy() {
        let data = DbcBuilder::new(b"\0ab\0").record(|r| r.u32(1).u32(4)).build();
        let layout = Arc::new(FormatSpec::parse("ns").unwrap());
        let options = DecodeOptions {
            string_offset_policy: StringOffsetPolicy::Empty,
        };
        let table = DbcTable::parse("Test", &data, layout, &options).unwrap();
        assert_eq!(table.records()[0][1], FieldValue::String(String::new()));
        assert_eq!(table.bad_string_offsets(), 1);
    }

    #[test]
    fn test_read_cstring() {
        let block = b"\0abc\0d";
        assert_eq!(read_cstring(block, 0).unwrap(), "");
        assert_eq!(read_cstring(block, 1).unwrap(), "abc");
        assert_eq!(read_cstring(block, 2).unwrap(), "bc");
        // Unterminated tail
        assert_eq!(read_cstring(block, 5).unwrap(), "d");
        assert!(matches!(
            read_cstring(block, 6),
            Err(Error::BadStringOffset { offset: 6, size: 6 })
        ));
        // Offset 0 holds even for an empty block
        assert_eq!(read_cstring(b"", 0).unwrap(), "");
    }

    #[test]
    fn test_zero_records() {
        let data = DbcBuilder::new(b"").build_with_fields(3, 12);
        let table = decode(&data, "nii").unwrap();
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_zero_width_layout_rejects_records() {
        for record_count in [5_000_000u32, u32::MAX] {
            let mut data = DbcHeader::MAGIC.to_vec();
            data.extend_from_slice(&record_count.to_le_bytes());
            data.extend_from_slice(&[0u8; 12]);
            assert!(matches!(
                decode(&data, ""),
                Err(Error::LayoutMismatch { actual_size: 0, .. })
            ));
        }

        let empty = DbcBuilder::new(b"").build_with_fields(0, 0);
        assert_eq!(decode(&empty, "").unwrap().record_count(), 0);
    }
}
