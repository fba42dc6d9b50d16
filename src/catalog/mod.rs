//! Table metadata supplied from outside the binary files
//!
//! Two kinds of metadata are consumed:
//!
//! - a **format catalog** mapping table names to format strings, required to
//!   decode a table at all
//! - optional **field mappings** giving display names to field indices

mod header;
mod mapping;

pub use header::HeaderFormatCatalog;
pub use mapping::{ArrayElement, FieldInfo, FieldMapping, FieldMappings};

use std::collections::BTreeMap;

/// Source of format strings keyed by table name
pub trait FormatCatalog: Send + Sync {
    /// Exact, case-sensitive lookup
    fn lookup_format(&self, name: &str) -> Option<&str>;

    /// Every name the catalog knows, sorted
    fn table_names(&self) -> Vec<String>;

    /// Lookup with the usual aliases
    ///
    /// A trailing `fmt` on the requested name is dropped, then the exact name
    /// is tried, then the name with an `Entry` suffix.
    fn resolve_format(&self, name: &str) -> Option<&str> {
        let name = name.strip_suffix("fmt").filter(|n| !n.is_empty()).unwrap_or(name);
        self.lookup_format(name)
            .or_else(|| self.lookup_format(&format!("{}Entry", name)))
    }
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticFormatCatalog {
    formats: BTreeMap<String, String>,
}

impl StaticFormatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, format: impl Into<String>) {
        self.formats.insert(name.into(), format.into());
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticFormatCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (name, format) in iter {
            catalog.insert(name, format);
        }
        catalog
    }
}

impl FormatCatalog for StaticFormatCatalog {
    fn lookup_format(&self, name: &str) -> Option<&str> {
        self.formats.get(name).map(String::as_str)
    }

    fn table_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }
}
