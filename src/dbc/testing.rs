//! Builders for WDBC byte images used by unit tests

use crate::dbc::header::DbcHeader;

/// Raw bytes of one record, written left to right
#[derive(Default)]
pub(crate) struct RecordBytes {
    bytes: Vec<u8>,
    values: u32,
}

impl RecordBytes {
    pub fn u32(mut self, v: u32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self.values += 1;
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self.values += 1;
        self
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.bytes.push(v);
        self.values += 1;
        self
    }
}

/// Assembles a complete WDBC file image
///
/// Field count defaults to the number of values in the first record and
/// record size to its byte length.
pub(crate) struct DbcBuilder {
    magic: [u8; 4],
    string_block: Vec<u8>,
    records: Vec<RecordBytes>,
    field_count: Option<u32>,
}

impl DbcBuilder {
    pub fn new(string_block: &[u8]) -> Self {
        Self {
            magic: DbcHeader::MAGIC,
            string_block: string_block.to_vec(),
            records: Vec::new(),
            field_count: None,
        }
    }

    pub fn magic(mut self, magic: &[u8; 4]) -> Self {
        self.magic = *magic;
        self
    }

    pub fn fields(mut self, count: u32) -> Self {
        self.field_count = Some(count);
        self
    }

    pub fn record(mut self, f: impl FnOnce(RecordBytes) -> RecordBytes) -> Self {
        self.records.push(f(RecordBytes::default()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let field_count = self
            .field_count
            .unwrap_or_else(|| self.records.first().map(|r| r.values).unwrap_or(0));
        let record_size = self.records.first().map(|r| r.bytes.len()).unwrap_or(0) as u32;
        self.build_with_fields(field_count, record_size)
    }

    pub fn build_with_fields(self, field_count: u32, record_size: u32) -> Vec<u8> {
        let mut data = self.magic.to_vec();
        data.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        data.extend_from_slice(&field_count.to_le_bytes());
        data.extend_from_slice(&record_size.to_le_bytes());
        data.extend_from_slice(&(self.string_block.len() as u32).to_le_bytes());
        for record in &self.records {
            data.extend_from_slice(&record.bytes);
        }
        data.extend_from_slice(&self.string_block);
        data
    }
}

/// The two-row `nifss` table with string block `\0abc\0d\0`
pub(crate) fn sample_table() -> Vec<u8> {
    DbcBuilder::new(b"\0abc\0d\0")
        .record(|r| r.u32(100).u32(2567).f32(0.5).u32(1).u32(5))
        .record(|r| r.u32(200).u32(3).f32(1.0).u32(5).u32(0))
        .build()
}

/// Four rows of `niis`, two of which share 2567 in field 2
pub(crate) fn skill_table() -> Vec<u8> {
    DbcBuilder::new(b"\0Mining\0Herbalism\0")
        .record(|r| r.u32(1).u32(186).u32(2567).u32(1))
        .record(|r| r.u32(2).u32(182).u32(2366).u32(8))
        .record(|r| r.u32(3).u32(186).u32(2567).u32(1))
        .record(|r| r.u32(4).u32(182).u32(9).u32(8))
        .build()
}
