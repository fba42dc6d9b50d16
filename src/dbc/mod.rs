//! WDBC (`.dbc`) client database tables
//!
//! A `.dbc` file is a flat table of fixed-size records followed by a block of
//! NUL-terminated strings. The file does not describe its own columns; each
//! table needs a format string (see [`FormatSpec`]) naming the type of every
//! 4-byte or 1-byte slot in a record.
//!
//! ## Format Overview
//!
//! - 20-byte header: `WDBC` signature, record count, field count, record size
//!   and string block size, all little-endian `u32`
//! - `record_count * record_size` bytes of records
//! - String block, addressed by byte offsets stored in string fields
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wdbc::dbc::{DbcTable, DecodeOptions, FieldValue, Filter, FormatSpec};
//!
//! let data = std::fs::read("dbc/SkillLineAbility.dbc")?;
//! let layout = Arc::new(FormatSpec::parse("niiiixxixiiixx")?);
//! let table = DbcTable::parse("SkillLineAbility", &data, layout, &DecodeOptions::default())?;
//!
//! let filter = Filter::new().with(2, FieldValue::UInt(2567));
//! for row in table.by_filter(&filter, Some(10))? {
//!     println!("{}: {:?}", row.index, row.record.values());
//! }
//! # Ok::<(), wdbc::Error>(())
//! ```

mod header;
mod layout;
mod query;
mod reader;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use header::DbcHeader;
pub use layout::FormatSpec;
pub(crate) use query::describe_layout;
pub use query::{column_kind, FieldDescription, Filter, ProjectedRow, Row};
pub use reader::{read_cstring, DbcTable, DecodeOptions, Record, StringOffsetPolicy};
pub use types::{FieldType, FieldValue, ValueKind};
