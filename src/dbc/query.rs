//! Point, filter and projection queries over a decoded table

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::catalog::{ArrayElement, FieldMapping};
use crate::dbc::header::DbcHeader;
use crate::dbc::layout::FormatSpec;
use crate::dbc::reader::{DbcTable, Record};
use crate::dbc::types::{FieldType, FieldValue, ValueKind};
use crate::error::{Error, Result};

/// Exact-match predicates, one `(field index, value)` pair each
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(usize, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `push`
    pub fn with(mut self, index: usize, value: FieldValue) -> Self {
        self.push(index, value);
        self
    }

    pub fn push(&mut self, index: usize, value: FieldValue) {
        self.predicates.push((index, value));
    }

    pub fn predicates(&self) -> &[(usize, FieldValue)] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// A record matches when every predicate's field equals its value
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|(index, value)| record.get(*index) == Some(value))
    }

    /// Build a filter from caller-supplied `{"<index>": value}` pairs
    ///
    /// Keys must be decimal field indices within the layout, and each value
    /// must have the kind of its field.
    pub fn from_json(map: &Map<String, Value>, layout: &FormatSpec) -> Result<Self> {
        let mut filter = Filter::new();
        for (key, value) in map {
            let index: usize = key.trim().parse().map_err(|_| {
                Error::InvalidFilter(format!("filter key '{}' is not a field index", key))
            })?;
            let kind = column_kind(layout, index)?;
            let value = FieldValue::from_json(value, kind).map_err(|e| match e {
                Error::InvalidFilter(msg) => Error::InvalidFilter(format!("field {}: {}", index, msg)),
                other => other,
            })?;
            filter.push(index, value);
        }
        Ok(filter)
    }
}

/// Value kind of canonical column `index`
pub fn column_kind(layout: &FormatSpec, index: usize) -> Result<ValueKind> {
    layout.check_column(index)?;
    layout
        .field_type(index)
        .and_then(FieldType::value_kind)
        .ok_or(Error::InvalidColumn {
            index,
            field_count: layout.field_count(),
        })
}

/// A record together with its position in decode order
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub index: usize,
    pub record: &'a Record,
}

/// A record reduced to the requested columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedRow {
    pub row_index: usize,
    pub columns: Vec<usize>,
    pub values: Vec<FieldValue>,
}

impl ProjectedRow {
    /// Render as an object keyed by mapped field names
    ///
    /// `mapping` is keyed by field index (see [`FieldMapping::for_layout`]).
    /// Array-style names (`Name[0]`, `Name[1]`, ...) fold into one JSON array
    /// ordered by element number; a plain field already named `Name` moves
    /// to `Name_value`.
    pub fn to_named(&self, mapping: Option<&FieldMapping>) -> Map<String, Value> {
        let mut object = Map::new();
        let mut arrays: BTreeMap<String, BTreeMap<usize, Value>> = BTreeMap::new();
        for (&index, value) in self.columns.iter().zip(&self.values) {
            let info = mapping.and_then(|m| m.get(index));
            match info.and_then(|i| ArrayElement::parse(&i.name)) {
                Some(element) => {
                    arrays
                        .entry(element.base)
                        .or_default()
                        .insert(element.element, value.to_json());
                }
                None => {
                    let key = info
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| format!("field_{}", index));
                    object.insert(key, value.to_json());
                }
            }
        }
        for (base, items) in arrays {
            if let Some(scalar) = object.remove(&base) {
                object.insert(format!("{}_value", base), scalar);
            }
            object.insert(base, Value::Array(items.into_values().collect()));
        }
        object
    }
}

/// One entry of `describe` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescription {
    pub index: usize,
    pub field_type: FieldType,
    pub kind: ValueKind,
    /// Display name, `None` for unmapped fields
    pub name: Option<String>,
    pub semantic_type: Option<String>,
    /// Array group this field belongs to, if its name has the form `Base[k]`
    pub array: Option<ArrayElement>,
}

impl DbcTable {
    /// First record whose field 0 equals `id`
    pub fn by_id(&self, id: &FieldValue) -> Result<Row<'_>> {
        self.records()
            .iter()
            .enumerate()
            .find(|(_, record)| record.id() == Some(id))
            .map(|(index, record)| Row { index, record })
            .ok_or_else(|| Error::NotFound(format!("no record with id {} in {}", id, self.name())))
    }

    /// Record at position `n` in decode order
    pub fn by_row_index(&self, n: usize) -> Result<Row<'_>> {
        self.records()
            .get(n)
            .map(|record| Row { index: n, record })
            .ok_or(Error::IndexOutOfRange {
                index: n,
                count: self.record_count(),
            })
    }

    /// Matching records in decode order, at most `limit` of them
    pub fn by_filter(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Row<'_>>> {
        for (index, _) in filter.predicates() {
            self.layout().check_column(*index)?;
        }
        let matches = self
            .rows()
            .filter(|row| filter.matches(row.record))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(matches)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records()
            .iter()
            .enumerate()
            .map(|(index, record)| Row { index, record })
    }

    /// Reduce rows to `columns`, in the order given; all fields when `None`
    pub fn project(&self, rows: &[Row<'_>], columns: Option<&[usize]>) -> Result<Vec<ProjectedRow>> {
        let columns: Vec<usize> = match columns {
            Some(columns) => {
                for &index in columns {
                    self.layout().check_column(index)?;
                }
                columns.to_vec()
            }
            None => (0..self.field_count()).collect(),
        };

        Ok(rows
            .iter()
            .map(|row| ProjectedRow {
                row_index: row.index,
                values: columns.iter().map(|&i| row.record[i].clone()).collect(),
                columns: columns.clone(),
            })
            .collect())
    }

    /// Type and, when mapped, display name of every canonical field
    ///
    /// `mapping` is keyed by field index (see [`FieldMapping::for_layout`]).
    pub fn describe(&self, mapping: Option<&FieldMapping>) -> Vec<FieldDescription> {
        describe_layout(self.layout(), mapping)
    }

    /// Header counts; no record bodies involved
    pub fn info(&self) -> DbcHeader {
        self.header
    }
}

pub(crate) fn describe_layout(
    layout: &FormatSpec,
    mapping: Option<&FieldMapping>,
) -> Vec<FieldDescription> {
    layout
        .fields()
        .iter()
        .enumerate()
        .filter_map(|(index, &field_type)| {
            let kind = field_type.value_kind()?;
            let info = mapping.and_then(|m| m.get(index));
            Some(FieldDescription {
                index,
                field_type,
                kind,
                name: info.map(|i| i.name.clone()),
                semantic_type: info.map(|i| i.semantic_type.clone()),
                array: info.and_then(|i| ArrayElement::parse(&i.name)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldInfo;
    use crate::dbc::reader::DecodeOptions;
    use crate::dbc::testing::{sample_table, skill_table};
    use serde_json::json;
    use std::sync::Arc;

    fn load(data: &[u8], format: &str) -> DbcTable {
        let layout = Arc::new(FormatSpec::parse(format).unwrap());
        DbcTable::parse("Test", data, layout, &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn test_by_id_resolves_strings() {
        let table = load(&sample_table(), "nifss");
        let row = table.by_id(&FieldValue::UInt(100)).unwrap();
        assert_eq!(row.index, 0);
        assert_eq!(row.record[3], FieldValue::String("abc".into()));
        assert_eq!(row.record[4], FieldValue::String("d".into()));

        let row = table.by_id(&FieldValue::UInt(200)).unwrap();
        assert_eq!(row.index, 1);
    }

    #[test]
    fn test_by_id_not_found() {
        let table = load(&sample_table(), "nifss");
        assert!(matches!(
            table.by_id(&FieldValue::UInt(999_999)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_by_row_index() {
        let table = load(&sample_table(), "nifss");
        assert_eq!(table.by_row_index(1).unwrap().record[0], FieldValue::UInt(200));
        assert!(matches!(
            table.by_row_index(2),
            Err(Error::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_filter_shared_value() {
        let table = load(&skill_table(), "niis");
        let filter = Filter::new().with(2, FieldValue::UInt(2567));
        let rows = table.by_filter(&filter, None).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.record[0].clone()).collect();
        assert_eq!(ids, vec![FieldValue::UInt(1), FieldValue::UInt(3)]);
    }

    #[test]
    fn test_filter_combines_predicates_and_strings() {
        let table = load(&skill_table(), "niis");
        let filter = Filter::new()
            .with(1, FieldValue::UInt(182))
            .with(3, FieldValue::String("Herbalism".into()));
        let rows = table.by_filter(&filter, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[1].index, 3);
    }

    #[test]
    fn test_empty_filter_returns_all_in_order() {
        let table = load(&skill_table(), "niis");
        let rows = table.by_filter(&Filter::new(), None).unwrap();
        let order: Vec<_> = rows.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let limited = table.by_filter(&Filter::new(), Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].index, 1);
    }

    #[test]
    fn test_filter_kind_mismatch_never_matches() {
        let table = load(&skill_table(), "niis");
        let filter = Filter::new().with(2, FieldValue::String("2567".into()));
        assert!(table.by_filter(&filter, None).unwrap().is_empty());
    }

    #[test]
    fn test_filter_invalid_column() {
        let table = load(&skill_table(), "niis");
        let filter = Filter::new().with(4, FieldValue::UInt(1));
        assert!(matches!(
            table.by_filter(&filter, None),
            Err(Error::InvalidColumn { index: 4, field_count: 4 })
        ));
    }

    #[test]
    fn test_filter_from_json() {
        let layout = FormatSpec::parse("niis").unwrap();
        let map = json!({"2": 2567, "3": "Mining"});
        let filter = Filter::from_json(map.as_object().unwrap(), &layout).unwrap();
        assert_eq!(
            filter.predicates(),
            &[
                (2, FieldValue::UInt(2567)),
                (3, FieldValue::String("Mining".into()))
            ]
        );

        let bad_key = json!({"two": 1});
        assert!(matches!(
            Filter::from_json(bad_key.as_object().unwrap(), &layout),
            Err(Error::InvalidFilter(_))
        ));
        let out_of_range = json!({"9": 1});
        assert!(matches!(
            Filter::from_json(out_of_range.as_object().unwrap(), &layout),
            Err(Error::InvalidColumn { index: 9, .. })
        ));
        let wrong_kind = json!({"3": 5});
        assert!(matches!(
            Filter::from_json(wrong_kind.as_object().unwrap(), &layout),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_project_order_and_errors() {
        let table = load(&sample_table(), "nifss");
        let rows: Vec<_> = table.rows().collect();
        let projected = table.project(&rows, Some(&[2, 0])).unwrap();
        for (p, row) in projected.iter().zip(&rows) {
            assert_eq!(p.values, vec![row.record[2].clone(), row.record[0].clone()]);
        }

        let all = table.project(&rows, None).unwrap();
        assert_eq!(all[0].values.len(), 5);
        assert_eq!(all[0].columns, vec![0, 1, 2, 3, 4]);

        assert!(matches!(
            table.project(&rows, Some(&[5])),
            Err(Error::InvalidColumn { index: 5, field_count: 5 })
        ));
    }

    #[test]
    fn test_describe_with_partial_mapping() {
        let table = load(&sample_table(), "nifss");
        let mapping = FieldMapping::from_iter([
            (0, FieldInfo::new("ID", "uint32")),
            (3, FieldInfo::new("Name[0]", "string_array")),
            (4, FieldInfo::new("Name[1]", "string_array")),
        ]);
        let fields = table.describe(Some(&mapping));
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0].name.as_deref(), Some("ID"));
        assert_eq!(fields[1].name, None);
        assert_eq!(fields[2].field_type, FieldType::Float);
        assert_eq!(fields[4].array.as_ref().map(|a| a.element), Some(1));

        let unmapped = table.describe(None);
        assert!(unmapped.iter().all(|f| f.name.is_none()));
    }

    #[test]
    fn test_named_rows_fold_arrays() {
        let table = load(&sample_table(), "nifss");
        let mapping = FieldMapping::from_iter([
            (0, FieldInfo::new("ID", "uint32")),
            (3, FieldInfo::new("Name[0]", "string_array")),
            (4, FieldInfo::new("Name[1]", "string_array")),
        ]);
        let row = table.by_row_index(0).unwrap();
        let projected = table.project(&[row], None).unwrap();
        let named = projected[0].to_named(Some(&mapping));
        assert_eq!(
            Value::Object(named),
            json!({"ID": 100, "field_1": 2567, "field_2": 0.5, "Name": ["abc", "d"]})
        );
    }

    #[test]
    fn test_named_rows_keep_scalar_sharing_array_base() {
        let table = load(&sample_table(), "nifss");
        let mapping = FieldMapping::from_iter([
            (1, FieldInfo::new("Name", "uint32")),
            (3, FieldInfo::new("Name[0]", "string_array")),
            (4, FieldInfo::new("Name[1]", "string_array")),
        ]);
        let row = table.by_row_index(0).unwrap();
        let projected = table.project(&[row], Some(&[1, 3, 4])).unwrap();
        let named = projected[0].to_named(Some(&mapping));
        assert_eq!(
            Value::Object(named),
            json!({"Name_value": 2567, "Name": ["abc", "d"]})
        );
    }

    #[test]
    fn test_info_matches_header() {
        let data = sample_table();
        let table = load(&data, "nifss");
        let info = table.info();
        assert_eq!(info.record_count, 2);
        assert_eq!(info.field_count, 5);
        assert_eq!(info.record_size, 20);
        assert_eq!(info.string_block_size, 7);
    }
}
