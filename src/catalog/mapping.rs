//! Field-name mappings loaded from JSON
//!
//! The expected document maps table names to format-string columns:
//!
//! ```json
//! { "SkillLineAbility": { "0": { "name": "ID", "type": "uint32" } } }
//! ```
//!
//! Columns count every format character, padding included, so a loaded
//! mapping must go through [`FieldMapping::for_layout`] before its keys can
//! be used as field indices.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::dbc::FormatSpec;
use crate::error::{Error, Result};

/// Display name and semantic type of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub semantic_type: String,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, semantic_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            semantic_type: semantic_type.into(),
        }
    }
}

/// Position of a field inside an array-style group such as `Name[3]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayElement {
    pub base: String,
    pub element: usize,
}

impl ArrayElement {
    /// Split `Base[k]` into its parts
    pub fn parse(name: &str) -> Option<Self> {
        let inner = name.strip_suffix(']')?;
        let (base, element) = inner.rsplit_once('[')?;
        if base.is_empty() {
            return None;
        }
        Some(ArrayElement {
            base: base.to_string(),
            element: element.parse().ok()?,
        })
    }
}

/// Index to name mapping for one table, keyed by column or by field index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping {
    fields: BTreeMap<usize, FieldInfo>,
}

impl FieldMapping {
    pub fn get(&self, index: usize) -> Option<&FieldInfo> {
        self.fields.get(&index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FieldInfo)> {
        self.fields.iter().map(|(i, info)| (*i, info))
    }

    /// Re-key from format-string columns to canonical field indices
    ///
    /// Entries on padding columns or past the end of the format are dropped.
    pub fn for_layout(&self, layout: &FormatSpec) -> FieldMapping {
        self.fields
            .iter()
            .filter_map(|(&column, info)| {
                layout
                    .canonical_index(column)
                    .map(|index| (index, info.clone()))
            })
            .collect()
    }

    /// Number of indices below `field_count` that carry a name
    pub fn mapped_count(&self, field_count: usize) -> usize {
        self.fields.range(..field_count).count()
    }

    /// Contiguous runs of `Base[0]`, `Base[1]`, ... as `(base, indices)`
    pub fn array_groups(&self) -> Vec<(String, Vec<usize>)> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (index, info) in self.iter() {
            let Some(element) = ArrayElement::parse(&info.name) else {
                continue;
            };
            match groups.last_mut() {
                Some((base, indices))
                    if *base == element.base
                        && indices.last().map(|last| last + 1) == Some(index) =>
                {
                    indices.push(index);
                }
                _ => groups.push((element.base, vec![index])),
            }
        }
        groups
    }
}

impl FromIterator<(usize, FieldInfo)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (usize, FieldInfo)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Field mappings for every table
#[derive(Debug, Clone, Default)]
pub struct FieldMappings {
    tables: HashMap<String, FieldMapping>,
}

impl FieldMappings {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        Self::from_json_str(&source)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, FieldInfo>> =
            serde_json::from_str(source).map_err(|e| Error::Catalog(e.to_string()))?;

        let mut tables = HashMap::with_capacity(raw.len());
        for (table, fields) in raw {
            let mut mapping = BTreeMap::new();
            for (key, info) in fields {
                let index: usize = key.parse().map_err(|_| {
                    Error::Catalog(format!("{}: field key '{}' is not an index", table, key))
                })?;
                mapping.insert(index, info);
            }
            tables.insert(table, FieldMapping { fields: mapping });
        }
        Ok(Self { tables })
    }

    pub fn insert(&mut self, table: impl Into<String>, mapping: FieldMapping) {
        self.tables.insert(table.into(), mapping);
    }

    /// Mapping for `table`, also trying the name without an `Entry` suffix
    pub fn get(&self, table: &str) -> Option<&FieldMapping> {
        self.tables.get(table).or_else(|| {
            table
                .strip_suffix("Entry")
                .and_then(|base| self.tables.get(base))
        })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
