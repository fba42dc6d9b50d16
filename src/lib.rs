//! # wdbc
//!
//! A Rust library for reading and querying WDBC (`.dbc`) client database
//! tables.
//!
//! ## Overview
//!
//! `.dbc` files hold fixed-size records whose column types are only known
//! from an external format catalog (a C++ header of `<Name>fmt[]`
//! declarations). This library provides:
//!
//! - Format string parsing and table name resolution
//! - Header validation and record decoding
//! - Lookup by id, by row position and by exact-match filters
//! - Column projection and field-name mappings
//! - A per-process table cache and a request-level [`DbcService`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use wdbc::{DbcConfig, DbcService, QueryRequest};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DbcConfig::load(None)?;
//!     let service = DbcService::from_config(&config)?;
//!
//!     let request = QueryRequest {
//!         id: Some(serde_json::json!(133)),
//!         ..Default::default()
//!     };
//!     let outcome = service.query("Spell", &request)?;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dbc;
pub mod error;
pub mod service;
pub mod storage;

pub use cache::TableCache;
pub use catalog::{FieldMappings, FormatCatalog, HeaderFormatCatalog, StaticFormatCatalog};
pub use config::DbcConfig;
pub use dbc::{DbcHeader, DbcTable, DecodeOptions, FieldValue, Filter, FormatSpec, StringOffsetPolicy};
pub use error::{Error, Result};
pub use service::{DbcService, QueryOutcome, QueryRequest};
pub use storage::{DirectorySource, MemorySource, TableSource};
