//! MCP Server implementation for WDBC tables

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_router,
    ErrorData as McpError, ServerHandler,
};
use serde_json::json;
use tracing::info;
use wdbc::{DbcConfig, DbcService};

use crate::tools::*;

const MAX_PAGE_SIZE: usize = 100;

/// WDBC MCP Server
///
/// Provides MCP tools for listing, describing and querying `.dbc` tables.
#[derive(Clone)]
pub struct DbcServer {
    /// Shared query service; its table cache lives as long as the server
    service: Arc<DbcService>,
    /// Tool router for MCP
    tool_router: ToolRouter<Self>,
    /// Cap applied to caller-supplied limits
    max_limit: usize,
}

/// Map a library error onto an MCP error, keeping its kind in `data`
fn to_mcp_error(table: &str, err: wdbc::Error) -> McpError {
    let data = Some(json!({ "kind": err.kind(), "table": table }));
    let message = err.to_string();
    match err {
        wdbc::Error::NotFound(_) | wdbc::Error::FormatNotFound(_) => {
            McpError::resource_not_found(message, data)
        }
        err if err.is_request_error() => McpError::invalid_params(message, data),
        _ => McpError::internal_error(message, data),
    }
}

#[tool_router]
impl DbcServer {
    /// Create a new server from configuration
    pub fn new(config: &DbcConfig) -> Result<Self> {
        let service = DbcService::from_config(config).with_context(|| {
            format!(
                "Failed to open tables (format file: {}, dbc path: {})",
                config.format_file.display(),
                config.dbc_path.display()
            )
        })?;
        Ok(Self::from_service(Arc::new(service), config.max_limit))
    }

    /// Create a new server around an existing service
    pub fn from_service(service: Arc<DbcService>, max_limit: usize) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
            max_limit: max_limit.max(1),
        }
    }

    pub fn service(&self) -> &DbcService {
        &self.service
    }

    /// Query rows of a table
    #[tool(
        name = "query_dbc",
        description = "Query a WDBC table. Lookup modes in precedence order: info=true (header counts only), id (field 0 equals value), row_index (0-based position), filter ({\"<field index>\": value}, all must match). With none of them all rows are returned. Use columns to pick fields, limit to cap rows (server maximum applies), named=true to key values by mapped field names. Call describe_dbc first to learn field indices and types."
    )]
    async fn query_dbc(
        &self,
        Parameters(request): Parameters<QueryDbcRequest>,
    ) -> Result<CallToolResult, McpError> {
        let query = request.to_query(self.max_limit);
        let table = request.table.clone();

        // First access decodes the whole file
        let outcome = self
            .run_blocking(move |service| service.query(&table, &query))
            .await?
            .map_err(|e| to_mcp_error(&request.table, e))?;

        Ok(CallToolResult::success(vec![Content::json(outcome)?]))
    }

    /// List tables known to the format catalog
    #[tool(
        name = "list_dbcs",
        description = "List tables from the format catalog with field counts, record sizes, whether a .dbc file exists and how many fields have names. Parameters: search (optional case-insensitive substring), page (1-indexed), page_size (max 100)."
    )]
    async fn list_dbcs(
        &self,
        Parameters(request): Parameters<ListDbcsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let page_size = request.pagination.page_size.min(MAX_PAGE_SIZE).max(1);
        let page = request.pagination.page.max(1);

        let search = request.search.clone();
        let all = self
            .run_blocking(move |service| service.list_tables(search.as_deref()))
            .await?;
        let total_count = all.len();
        let total_pages = (total_count + page_size - 1) / page_size;
        let tables = all
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        let response = ListDbcsResponse {
            tables,
            total_count,
            page,
            page_size,
            total_pages,
        };

        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Describe the fields of a table
    #[tool(
        name = "describe_dbc",
        description = "Describe the fields of a table: index, storage type, value kind, and mapped name and semantic type where known. Array-style names such as Name[0] are reported as groups. Does not read the .dbc file."
    )]
    async fn describe_dbc(
        &self,
        Parameters(request): Parameters<TableRequest>,
    ) -> Result<CallToolResult, McpError> {
        let table = request.table.clone();
        let description = self
            .run_blocking(move |service| service.describe_fields(&table))
            .await?
            .map_err(|e| to_mcp_error(&request.table, e))?;

        Ok(CallToolResult::success(vec![Content::json(description)?]))
    }

    /// Header information for a table
    #[tool(
        name = "get_info",
        description = "Get header counts of a .dbc file (records, fields, record size, string block size) and whether its format string matches. Reads only the 20-byte header unless the table is already loaded."
    )]
    async fn get_info(
        &self,
        Parameters(request): Parameters<TableRequest>,
    ) -> Result<CallToolResult, McpError> {
        let table = request.table.clone();
        let info = self
            .run_blocking(move |service| service.info(&table))
            .await?
            .map_err(|e| to_mcp_error(&request.table, e))?;

        Ok(CallToolResult::success(vec![Content::json(info)?]))
    }
}

impl DbcServer {
    /// Run `f` against the service on the blocking pool
    ///
    /// Every service call may touch the file system.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, McpError>
    where
        F: FnOnce(&DbcService) -> T + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| McpError::internal_error(format!("Blocking task failed: {}", e), None))
    }
}

impl ServerHandler for DbcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "WDBC (.dbc) client database MCP Server. \
                \n\nRecommended workflow: \
                \n1. Use list_dbcs with a search term to find a table \
                \n2. Use describe_dbc to learn field indices and types \
                \n3. Use get_info for record counts \
                \n4. Use query_dbc with id, row_index or filter \
                \n\nField indices count only real fields; padding in the format string is not numbered. \
                \nString fields that point outside the string block are returned as {\"invalid_string_offset\": n}."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.tool_router.list_all();
        std::future::ready(Ok(ListToolsResult {
            tools,
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        use rmcp::handler::server::tool::ToolCallContext;
        let tool_context = ToolCallContext::new(self, request, context);
        async move { self.tool_router.call(tool_context).await }
    }
}

/// Initialize tracing; `stderr` keeps stdout free for a stdio transport
fn init_tracing(stderr: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()),
    );
    if stderr {
        builder.with_writer(std::io::stderr).with_ansi(false).init();
    } else {
        builder.init();
    }
}

/// Start the MCP server with Streamable HTTP transport
///
/// # Arguments
/// * `config` - Table, catalog and mapping locations
/// * `port` - HTTP port to listen on
/// * `init_tracing` - Whether to initialize tracing (set to false if already initialized)
pub async fn start_mcp_server(config: &DbcConfig, port: u16, init_tracing: bool) -> Result<()> {
    use hyper::server::conn::http1;
    use hyper_util::rt::{TokioIo, TokioTimer};
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    };
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    if init_tracing {
        self::init_tracing(false);
    }

    info!("Loading format catalog: {}", config.format_file.display());
    let server = DbcServer::new(config)?;
    info!(
        "Serving tables from {} ({} formats known)",
        config.dbc_path.display(),
        server.service().cache().catalog().table_names().len()
    );

    // Bind to 0.0.0.0 to support remote connections
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting MCP server on http://{}/mcp", addr);

    let listener = TcpListener::bind(addr).await?;

    let http_config = StreamableHttpServerConfig::default();
    let session_manager = Arc::new(LocalSessionManager::default());

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        let server_clone = server.clone();
        let session_manager_clone = session_manager.clone();
        let config_clone = http_config.clone();

        tokio::spawn(async move {
            let service = StreamableHttpService::new(
                move || Ok(server_clone.clone()),
                session_manager_clone,
                config_clone,
            );

            let hyper_service = hyper_util::service::TowerToHyperService::new(service);

            // http1 only; SSE streams are more stable than with auto/h2
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .keep_alive(true)
                .serve_connection(io, hyper_service)
                .await
            {
                // IncompleteMessage and HeaderTimeout are routine with SSE keep-alive
                let err_debug = format!("{:?}", err);
                if !err_debug.contains("IncompleteMessage") && !err_debug.contains("HeaderTimeout") {
                    tracing::error!("Error serving connection: {:?}", err);
                }
            }
        });
    }
}

/// Start the MCP server on stdin/stdout
///
/// Logs go to stderr so they never interleave with protocol messages.
pub async fn start_stdio_server(config: &DbcConfig, init_tracing: bool) -> Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    if init_tracing {
        self::init_tracing(true);
    }

    info!("Loading format catalog: {}", config.format_file.display());
    let server = DbcServer::new(config)?;
    info!("Starting MCP server on stdio");

    let running = server
        .serve(stdio())
        .await
        .with_context(|| "Failed to start stdio transport")?;
    running.waiting().await?;
    Ok(())
}
