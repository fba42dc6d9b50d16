//! Table-name level operations for a request-dispatch boundary
//!
//! [`DbcService`] ties the format catalog, file storage, field mappings and
//! the table cache together and answers `query`, `list_tables`,
//! `describe_fields` and `info` requests. Request parameters arrive loosely
//! typed (JSON ids and filter maps) and are validated here before reaching
//! the query engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::TableCache;
use crate::catalog::{FieldMapping, FieldMappings, FormatCatalog, HeaderFormatCatalog};
use crate::config::DbcConfig;
use crate::dbc::{
    column_kind, describe_layout, DbcHeader, DbcTable, DecodeOptions, FieldDescription,
    FieldValue, Filter, FormatSpec, Row,
};
use crate::error::Result;
use crate::storage::{DirectorySource, TableSource, DBC_EXTENSION};

const FORMAT_PREVIEW_LEN: usize = 60;

/// Parameters of a `query` call
///
/// Mode precedence: `info`, then `id`, then `row_index`, then `filter`;
/// with none of them every record is returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Value of field 0 to look up
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, alias = "rowIndex")]
    pub row_index: Option<usize>,
    /// `{"<field index>": value}` exact-match predicates
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    /// Field indices to return, in order
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub info: bool,
    /// Also render each row keyed by mapped field names
    #[serde(default)]
    pub named: bool,
}

/// Which lookup answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Id,
    RowIndex,
    Filter,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub row_index: usize,
    pub values: Vec<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSet {
    pub table: String,
    pub mode: QueryMode,
    pub columns: Vec<usize>,
    pub rows: Vec<ResultRow>,
    pub count: usize,
    /// More rows matched than `limit` allowed
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    Info(TableInfo),
    Rows(RowSet),
}

/// Header-level facts about a table file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub table: String,
    pub file: String,
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
    /// File length the header implies
    pub expected_file_len: u64,
    pub format: Option<String>,
    /// Whether the format string agrees with the header, when one is known
    pub layout_matches: Option<bool>,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayGroup {
    pub name: String,
    pub indices: Vec<usize>,
}

/// `describe_fields` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescription {
    pub table: String,
    pub format: String,
    pub field_count: usize,
    pub record_size: usize,
    pub mapped_fields: usize,
    pub unmapped_fields: usize,
    pub fields: Vec<FieldDescription>,
    pub array_groups: Vec<ArrayGroup>,
}

/// One `list_tables` entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    /// Format string, shortened for display
    pub format: String,
    pub field_count: usize,
    pub record_size: usize,
    /// Table file name stem, when a file exists for this entry
    pub file: Option<String>,
    pub mapped_fields: Option<usize>,
    pub unmapped_fields: Option<usize>,
}

/// Query front door shared by the CLI and the MCP server
pub struct DbcService {
    cache: TableCache,
    mappings: FieldMappings,
}

impl DbcService {
    pub fn new(
        catalog: Arc<dyn FormatCatalog>,
        source: Arc<dyn TableSource>,
        mappings: FieldMappings,
        options: DecodeOptions,
    ) -> Self {
        Self {
            cache: TableCache::new(catalog, source, options),
            mappings,
        }
    }

    /// Build the file-backed service described by `config`
    pub fn from_config(config: &DbcConfig) -> Result<Self> {
        let catalog = HeaderFormatCatalog::open(&config.format_file)?;
        let mappings = match &config.field_mappings_file {
            Some(path) => FieldMappings::open(path)?,
            None => FieldMappings::default(),
        };
        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(DirectorySource::new(&config.dbc_path)),
            mappings,
            config.decode_options(),
        ))
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    pub fn mappings(&self) -> &FieldMappings {
        &self.mappings
    }

    /// Field names for `name`, keyed by field index of `layout`
    pub fn field_mapping(&self, name: &str, layout: &FormatSpec) -> Option<FieldMapping> {
        self.mappings.get(name).map(|m| m.for_layout(layout))
    }

    /// Decoded table, from the cache when possible
    pub fn table(&self, name: &str) -> Result<Arc<DbcTable>> {
        self.cache.get(name)
    }

    pub fn query(&self, name: &str, request: &QueryRequest) -> Result<QueryOutcome> {
        if request.info {
            return self.info(name).map(QueryOutcome::Info);
        }

        let table = self.table(name)?;
        let layout = table.layout();

        let (mode, rows, truncated): (QueryMode, Vec<Row<'_>>, bool) =
            if let Some(id) = &request.id {
                let id = FieldValue::from_json(id, column_kind(layout, 0)?)?;
                (QueryMode::Id, vec![table.by_id(&id)?], false)
            } else if let Some(n) = request.row_index {
                (QueryMode::RowIndex, vec![table.by_row_index(n)?], false)
            } else {
                let (mode, filter) = match &request.filter {
                    Some(map) => (QueryMode::Filter, Filter::from_json(map, layout)?),
                    None => (QueryMode::All, Filter::new()),
                };
                // One extra row tells whether the limit cut anything off
                let mut rows = table.by_filter(&filter, request.limit.map(|l| l.saturating_add(1)))?;
                let truncated = match request.limit {
                    Some(limit) if rows.len() > limit => {
                        rows.truncate(limit);
                        true
                    }
                    _ => false,
                };
                (mode, rows, truncated)
            };

        let projected = table.project(&rows, request.columns.as_deref())?;
        let columns = match &request.columns {
            Some(columns) => columns.clone(),
            None => (0..table.field_count()).collect(),
        };
        let mapping = if request.named {
            self.field_mapping(name, layout)
        } else {
            None
        };
        let rows: Vec<ResultRow> = projected
            .into_iter()
            .map(|row| ResultRow {
                named: request.named.then(|| row.to_named(mapping.as_ref())),
                row_index: row.row_index,
                values: row.values,
            })
            .collect();

        Ok(QueryOutcome::Rows(RowSet {
            table: name.to_string(),
            mode,
            columns,
            count: rows.len(),
            rows,
            truncated,
        }))
    }

    /// Header counts for `name`
    ///
    /// Only the header is read when the table is not cached, so this works on
    /// files whose body would fail to decode.
    pub fn info(&self, name: &str) -> Result<TableInfo> {
        let cached = self.cache.cached(name);
        let header = match &cached {
            Some(table) => table.header,
            None => DbcHeader::parse(&self.cache.source().read_header(name)?)?,
        };

        let format = self.cache.catalog().resolve_format(name).map(String::from);
        let layout_matches = format
            .as_deref()
            .and_then(|f| FormatSpec::parse(f).ok())
            .map(|layout| {
                layout.field_count() == header.field_count as usize
                    && layout.record_size() == header.record_size as usize
            });

        Ok(TableInfo {
            table: name.to_string(),
            file: format!("{}.{}", name, DBC_EXTENSION),
            record_count: header.record_count,
            field_count: header.field_count,
            record_size: header.record_size,
            string_block_size: header.string_block_size,
            expected_file_len: header.expected_file_len(),
            format,
            layout_matches,
            cached: cached.is_some(),
        })
    }

    /// Type and mapped name of every field of `name`
    ///
    /// Only the format string is needed; the table file is not read.
    pub fn describe_fields(&self, name: &str) -> Result<TableDescription> {
        let layout = FormatSpec::resolve(name, self.cache.catalog())?;
        let mapping = self.field_mapping(name, &layout);
        let fields = describe_layout(&layout, mapping.as_ref());
        let mapped_fields = fields.iter().filter(|f| f.name.is_some()).count();
        let array_groups = mapping
            .map(|m| {
                m.array_groups()
                    .into_iter()
                    .map(|(name, indices)| ArrayGroup { name, indices })
                    .collect()
            })
            .unwrap_or_default();

        Ok(TableDescription {
            table: name.to_string(),
            format: layout.format().to_string(),
            field_count: layout.field_count(),
            record_size: layout.record_size(),
            mapped_fields,
            unmapped_fields: layout.field_count() - mapped_fields,
            fields,
            array_groups,
        })
    }

    /// Catalog tables whose name contains `search`, ignoring case
    pub fn list_tables(&self, search: Option<&str>) -> Vec<TableSummary> {
        let catalog = self.cache.catalog();
        let files: HashSet<String> = self.cache.source().table_files().into_iter().collect();
        let search = search.map(str::to_lowercase).filter(|s| !s.is_empty());

        catalog
            .table_names()
            .into_iter()
            .filter(|name| {
                search
                    .as_deref()
                    .map_or(true, |s| name.to_lowercase().contains(s))
            })
            .map(|name| {
                let format = catalog.lookup_format(&name).unwrap_or_default();
                // A malformed format string still gets listed
                let layout = FormatSpec::parse(format).ok();
                let (field_count, record_size) = layout
                    .as_ref()
                    .map(|l| (l.field_count(), l.record_size()))
                    .unwrap_or((0, 0));
                let file = Some(name.as_str())
                    .filter(|n| files.contains(*n))
                    .or_else(|| name.strip_suffix("Entry").filter(|n| files.contains(*n)))
                    .map(String::from);
                let mapped = self.mappings.get(&name).map(|m| {
                    layout
                        .as_ref()
                        .map_or(0, |l| m.for_layout(l).mapped_count(field_count))
                });

                TableSummary {
                    format: preview(format),
                    field_count,
                    record_size,
                    file,
                    mapped_fields: mapped,
                    unmapped_fields: mapped.map(|m| field_count - m),
                    name,
                }
            })
            .collect()
    }
}

fn preview(format: &str) -> String {
    if format.chars().count() > FORMAT_PREVIEW_LEN {
        let head: String = format.chars().take(FORMAT_PREVIEW_LEN).collect();
        format!("{}...", head)
    } else {
        format.to_string()
    }
}
