//! wdbc - Query WDBC (.dbc) client database tables
//!
//! Usage:
//!   wdbc info <table>                 - Show header counts of a table
//!   wdbc query <table> [--id N]       - Query rows by id, row, or filter
//!   wdbc list [search]                - List tables from the format catalog
//!   wdbc describe <table>             - Describe the fields of a table
//!   wdbc mcp [--port N | --stdio]     - Start MCP server for table queries

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use wdbc::{DbcConfig, DbcService, QueryRequest};

#[derive(Parser)]
#[command(name = "wdbc")]
#[command(version = "0.1.0")]
#[command(about = "Decode and query WDBC .dbc client database tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the .dbc files
    #[arg(long, global = true)]
    dbc_path: Option<PathBuf>,

    /// C++ header with the format string declarations
    #[arg(long, global = true)]
    format_file: Option<PathBuf>,

    /// JSON field-name mappings
    #[arg(long, global = true)]
    field_mappings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header information of a table
    Info {
        /// Table name without extension
        table: String,
    },

    /// Query rows of a table
    Query {
        /// Table name without extension
        table: String,

        /// Value of field 0 to look up
        #[arg(long)]
        id: Option<String>,

        /// 0-based row position
        #[arg(long, conflicts_with = "id")]
        row: Option<usize>,

        /// Exact-match predicate IDX=VALUE (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Field indices to return (e.g., 0,2)
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<usize>>,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Key values by mapped field names
        #[arg(long)]
        named: bool,
    },

    /// List tables from the format catalog
    List {
        /// Case-insensitive name filter
        search: Option<String>,
    },

    /// Describe the fields of a table
    Describe {
        /// Table name without extension
        table: String,
    },

    /// Start MCP server for table queries
    #[cfg(feature = "mcp")]
    Mcp {
        /// HTTP port to listen on
        #[arg(short, long, default_value = "3721")]
        port: u16,

        /// Serve over stdin/stdout instead of HTTP
        #[arg(long, conflicts_with = "port")]
        stdio: bool,
    },
}

/// Parse a literal as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse `IDX=VALUE` pairs into a filter map
fn parse_filters(filters: &[String]) -> Result<Option<Map<String, Value>>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut map = Map::new();
    for filter in filters {
        let Some((index, value)) = filter.split_once('=') else {
            bail!("Invalid filter '{}', expected IDX=VALUE", filter);
        };
        map.insert(index.trim().to_string(), parse_value(value.trim()));
    }
    Ok(Some(map))
}

fn load_config(cli: &Cli) -> Result<DbcConfig> {
    let mut config = DbcConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.dbc_path {
        config.dbc_path = path.clone();
    }
    if let Some(path) = &cli.format_file {
        config.format_file = path.clone();
    }
    if let Some(path) = &cli.field_mappings {
        config.field_mappings_file = Some(path.clone());
    }
    Ok(config)
}

fn open_service(config: &DbcConfig) -> Result<DbcService> {
    DbcService::from_config(config).with_context(|| {
        format!(
            "Failed to open tables (format file: {}, dbc path: {})",
            config.format_file.display(),
            config.dbc_path.display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // The MCP server sets up its own subscriber
    #[cfg(feature = "mcp")]
    let serving = matches!(cli.command, Some(Commands::Mcp { .. }));
    #[cfg(not(feature = "mcp"))]
    let serving = false;
    if !serving {
        init_tracing();
    }

    match cli.command {
        Some(Commands::Info { table }) => {
            let service = open_service(&config)?;
            print_json(&service.info(&table)?)?;
        }
        Some(Commands::Query {
            table,
            id,
            row,
            filters,
            columns,
            limit,
            named,
        }) => {
            let service = open_service(&config)?;
            let request = QueryRequest {
                id: id.as_deref().map(parse_value),
                row_index: row,
                filter: parse_filters(&filters)?,
                columns,
                limit,
                info: false,
                named,
            };
            print_json(&service.query(&table, &request)?)?;
        }
        Some(Commands::List { search }) => {
            let service = open_service(&config)?;
            print_json(&service.list_tables(search.as_deref()))?;
        }
        Some(Commands::Describe { table }) => {
            let service = open_service(&config)?;
            print_json(&service.describe_fields(&table)?)?;
        }
        #[cfg(feature = "mcp")]
        Some(Commands::Mcp { port, stdio }) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                if stdio {
                    dbc_mcp::start_stdio_server(&config, true).await
                } else {
                    dbc_mcp::start_mcp_server(&config, port, true).await
                }
            })?;
        }
        None => {
            eprintln!("Usage: wdbc info <table>");
            eprintln!("       wdbc query <table> [--id N] [--row N] [-f IDX=VALUE]... [-c 0,2] [-l N] [--named]");
            eprintln!("       wdbc list [search]");
            eprintln!("       wdbc describe <table>");
            #[cfg(feature = "mcp")]
            eprintln!("       wdbc mcp [-p port | --stdio]");
            std::process::exit(1);
        }
    }

    Ok(())
}
