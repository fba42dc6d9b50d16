//! Format-string driven record layout

use crate::catalog::FormatCatalog;
use crate::dbc::types::FieldType;
use crate::error::{Error, Result};

/// Parsed format string for one table
///
/// Holds every tag in format order (skips included) together with the derived
/// per-field layout. Field indices used everywhere else are positions among
/// the non-skip tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    format: String,
    tags: Vec<FieldType>,
    /// Non-skip tags in canonical order
    fields: Vec<FieldType>,
    /// Byte offset of each canonical field within a record
    offsets: Vec<usize>,
    /// Tag position of each canonical field within the format string
    positions: Vec<usize>,
    record_size: usize,
}

impl FormatSpec {
    /// Parse a format string, one tag per character
    pub fn parse(format: &str) -> Result<Self> {
        let mut tags = Vec::with_capacity(format.len());
        let mut fields = Vec::new();
        let mut offsets = Vec::new();
        let mut positions = Vec::new();
        let mut record_size = 0usize;

        for (position, ch) in format.chars().enumerate() {
            let tag = FieldType::from_char(ch).ok_or(Error::InvalidFormatChar { ch, position })?;
            if !tag.is_skip() {
                fields.push(tag);
                offsets.push(record_size);
                positions.push(position);
            }
            record_size += tag.byte_width();
            tags.push(tag);
        }

        Ok(FormatSpec {
            format: format.to_string(),
            tags,
            fields,
            offsets,
            positions,
            record_size,
        })
    }

    /// Look up the table's format string in `catalog` and parse it
    pub fn resolve(table: &str, catalog: &dyn FormatCatalog) -> Result<Self> {
        let format = catalog
            .resolve_format(table)
            .ok_or_else(|| Error::FormatNotFound(table.to_string()))?;
        Self::parse(format)
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// All tags, skip tags included
    pub fn tags(&self) -> &[FieldType] {
        &self.tags
    }

    /// Tags of the canonical (non-skip) fields
    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.fields.get(index).copied()
    }

    pub fn field_offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Format-string position of canonical field `index`
    pub fn tag_position(&self, index: usize) -> Option<usize> {
        self.positions.get(index).copied()
    }

    /// Canonical index of the field at format-string position `position`
    ///
    /// `None` for skip tags and positions past the end of the format.
    pub fn canonical_index(&self, position: usize) -> Option<usize> {
        self.positions.binary_search(&position).ok()
    }

    /// Check a canonical index, failing with `InvalidColumn`
    pub fn check_column(&self, index: usize) -> Result<()> {
        if index < self.field_count() {
            Ok(())
        } else {
            Err(Error::InvalidColumn {
                index,
                field_count: self.field_count(),
            })
        }
    }
}
