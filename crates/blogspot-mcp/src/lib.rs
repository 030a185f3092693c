//! Model Context Protocol server core.
//!
//! This crate provides the pieces a service plugs its operations into:
//! - Registries for tools, resources and prompts with validation,
//!   usage statistics and uniform error normalization
//! - JSON-RPC dispatch of the MCP methods onto those registries
//! - Stdio (ndjson) and HTTP transports
//! - A small init/start/stop lifecycle runner
//!
//! # Example
//!
//! ```no_run
//! use blogspot_mcp::{
//!     serve_stdio, tool_handler, Dispatcher, FieldSpec, InputSchema, ToolCallResult,
//!     ToolDefinition, ToolRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tools = Arc::new(ToolRegistry::new());
//! tools
//!     .register(
//!         ToolDefinition::builder("echo")
//!             .description("Echo a message")
//!             .schema(InputSchema::new(vec![FieldSpec::string("message")]))
//!             .handler(tool_handler(|args, _ctx| async move {
//!                 Ok(ToolCallResult::text(args["message"].as_str().unwrap_or_default()))
//!             }))
//!             .build()?,
//!     )
//!     .await?;
//!
//! let dispatcher = Arc::new(Dispatcher::new("echo-server", "0.1.0").with_tools(tools));
//! serve_stdio(dispatcher).await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod http_serve;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod transport;

pub use dispatch::Dispatcher;
pub use error::{McpError, McpResult};
pub use http_serve::{create_mcp_router, serve_http, McpHttpState};
pub use lifecycle::{Health, Lifecycle};
pub use protocol::{
    GetPromptResult, McpPrompt, McpResource, McpTool, PromptMessage, ReadResourceResult,
    ResourceContent, Role, ToolCallResult, ToolContent, PROTOCOL_VERSION,
};
pub use registry::{
    prompt_handler, resource_handler, tool_handler, ExecutionContext, OperationKind,
    OperationStats, PromptDefinition, PromptHandler, PromptRegistry, Registry, RegistrySummary,
    RequestContext, ResourceDefinition, ResourceHandler, ResourceRegistry, ResourceRequest,
    ToolDefinition, ToolHandler, ToolRegistry,
};
pub use schema::{ArgumentKind, FieldKind, FieldSpec, InputSchema, PromptArgument};
pub use transport::{serve, serve_stdio, TransportError};
