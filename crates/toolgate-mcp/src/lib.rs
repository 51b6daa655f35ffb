//! # Toolgate MCP
//!
//! This crate turns plain Rust functions into discoverable, schema-described,
//! dependency-injected MCP (Model Context Protocol) tools, resources, and
//! prompts, and dispatches JSON-RPC 2.0 requests to them.
//!
//! ## Overview
//!
//! The toolgate-mcp crate handles:
//! - **Registration**: typed handler signatures, validated once at startup
//! - **Schemas**: JSON input schemas generated from declared parameter types
//! - **Collaborators**: clients resolved by type, one instance per process
//! - **JSON-RPC**: MCP protocol dispatch with contained tool failures
//!
//! ## MCP Protocol
//!
//! Supported methods:
//! - `initialize`: Initialize the MCP session
//! - `ping`: Liveness check
//! - `tools/list`: List available tools
//! - `tools/call`: Execute a tool
//! - `resources/list`: List available resources
//! - `resources/templates/list`: List templated resources
//! - `resources/read`: Read a resource
//! - `prompts/list`: List available prompts
//! - `prompts/get`: Render a prompt
//!
//! ## Usage
//!
//! ### Registering a Tool
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use toolgate_mcp::{
//!     from_fn, Collaborator, Invocation, McpServer, RegistryBuilder, ServerConfig, Signature,
//! };
//!
//! struct Ledger;
//!
//! #[async_trait]
//! impl Collaborator for Ledger {
//!     fn construct() -> anyhow::Result<Self> {
//!         Ok(Ledger)
//!     }
//!
//!     async fn authenticate(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! builder.collaborator::<Ledger>();
//! builder
//!     .tool(
//!         "add",
//!         "Add two numbers",
//!         Signature::new()
//!             .param::<f64>("a")
//!             .param::<f64>("b")
//!             .client::<Ledger>("ledger"),
//!         from_fn(|inv: &Invocation| {
//!             let _ledger: Arc<Ledger> = inv.client()?;
//!             Ok(inv.arg::<f64>("a")? + inv.arg::<f64>("b")?)
//!         }),
//!     )
//!     .expect("add registers");
//!
//! let server = McpServer::new(ServerConfig::from_env(), builder.build());
//! ```
//!
//! ### Handling MCP Requests
//!
//! ```rust,no_run
//! use toolgate_mcp::McpServer;
//!
//! async fn handle(server: &McpServer, body: &str) -> String {
//!     server.handle_json(body).await
//! }
//! ```

pub mod calculator;
pub mod clients;
pub mod config;
pub mod handler;
pub mod introspect;
pub mod registry;
pub mod schema;
pub mod server;
pub mod template;
pub mod types;

// Re-export main types
pub use clients::{ClientManager, Collaborator, CollaboratorError, ReauthPolicy};
pub use config::{ConfigError, ServerConfig};
pub use handler::{
    from_async, from_fn, prompt_fn, Arguments, HandlerResult, Invocation, InvocationError,
    PromptHandler, PromptOutput, ToolHandler, ToolOutput,
};
pub use introspect::{introspect, IntrospectionError, Signature, TypeDecl};
pub use registry::{NotFoundError, RegistrationError, Registry, RegistryBuilder};
pub use schema::{generate, SchemaGenerationError, SchemaType};
pub use server::{McpServer, McpServerError, McpServerResult};
pub use types::{
    ContentBlock, McpError, McpRequest, McpResponse, PromptMessage, RequestId, ServerCapabilities,
    ServerInfo, ToolDefinition, ToolResult,
};
