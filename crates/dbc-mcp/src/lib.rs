//! dbc-mcp - MCP Server for WDBC client database tables
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! `.dbc` table lookups for AI model consumption.
//!
//! ## Features
//!
//! - Table listing with name search and pagination
//! - Field descriptions with mapped names and array groups
//! - Header-only table info
//! - Lookup by id, row position or exact-match filter, with column projection
//!
//! ## Usage
//!
//! ### Streamable HTTP
//!
//! ```rust,no_run
//! use dbc_mcp::start_mcp_server;
//! use wdbc::DbcConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DbcConfig::load(None)?;
//!     start_mcp_server(&config, 3721, true).await
//! }
//! ```
//!
//! ### stdio
//!
//! ```rust,no_run
//! use dbc_mcp::start_stdio_server;
//! use wdbc::DbcConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DbcConfig::load(None)?;
//!     start_stdio_server(&config, true).await
//! }
//! ```

mod server;
mod tools;

pub use server::start_mcp_server;
pub use server::start_stdio_server;
pub use server::DbcServer;
