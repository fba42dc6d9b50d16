//! Tool definitions and request/response types for the MCP server

use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wdbc::service::{QueryRequest, TableSummary};

/// Pagination parameters for list operations
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: usize,
    /// Number of items per page (max 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// Request for querying a table
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryDbcRequest {
    /// Table name without extension, e.g. "Spell" or "SkillLineAbility"
    pub table: String,
    /// Look up the record whose field 0 equals this value
    #[serde(default)]
    pub id: Option<Value>,
    /// Return the record at this 0-based position
    #[serde(default)]
    pub row_index: Option<usize>,
    /// Exact-match filter as {"<field index>": value}, e.g. {"2": 2567}
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    /// Field indices to return, in order
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
    /// Maximum number of rows (capped by the server)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Return header info instead of rows
    #[serde(default)]
    pub info: bool,
    /// Also key each row by mapped field names
    #[serde(default)]
    pub named: bool,
}

impl QueryDbcRequest {
    /// Core query parameters with the limit capped at `max_limit`
    ///
    /// Scans without any lookup key get `max_limit` as their limit.
    pub fn to_query(&self, max_limit: usize) -> QueryRequest {
        let scans = self.id.is_none() && self.row_index.is_none();
        let limit = match self.limit {
            Some(limit) => Some(limit.min(max_limit)),
            None if scans => Some(max_limit),
            None => None,
        };
        QueryRequest {
            id: self.id.clone(),
            row_index: self.row_index,
            filter: self.filter.clone(),
            columns: self.columns.clone(),
            limit,
            info: self.info,
            named: self.named,
        }
    }
}

/// Request for listing tables
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListDbcsRequest {
    /// Optional case-insensitive substring filter on table names
    #[serde(default)]
    pub search: Option<String>,
    /// Pagination parameters
    #[serde(flatten, default)]
    pub pagination: PaginationParams,
}

/// Response for table listing
#[derive(Debug, Clone, Serialize)]
pub struct ListDbcsResponse {
    pub tables: Vec<TableSummary>,
    /// Total count of matching tables
    pub total_count: usize,
    /// Current page number
    pub page: usize,
    /// Page size
    pub page_size: usize,
    /// Total number of pages
    pub total_pages: usize,
}

/// Request naming a single table
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableRequest {
    /// Table name without extension
    pub table: String,
}
