//! MCP server implementation
//!
//! [`McpServer`] routes JSON-RPC envelopes to the registry. Protocol-shape
//! problems (malformed envelopes, unknown methods, unknown names, bad
//! params) become JSON-RPC `error` objects; everything that goes wrong while
//! running a validly addressed tool or resource is contained in a normal
//! result flagged `isError`, so the session and the shared state survive.

use crate::clients::ClientManager;
use crate::config::ServerConfig;
use crate::handler::{
    bind_arguments, Collaborators, Invocation, InvocationError, ToolHandler, ToolOutput,
};
use crate::registry::{NotFoundError, Registry, DEFAULT_RESOURCE_MIME_TYPE};
use crate::schema::{CollaboratorParam, ParameterDescriptor};
use crate::types::*;
use anyhow::anyhow;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// MCP server error types.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Tool, resource, or prompt not found
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for MCP server operations.
pub type McpServerResult<T> = Result<T, McpServerError>;

impl From<McpServerError> for McpError {
    fn from(err: McpServerError) -> Self {
        match err {
            McpServerError::NotFound(e) => McpError::invalid_params(e.to_string()),
            McpServerError::InvalidParams(_) => McpError::invalid_params(err.to_string()),
            McpServerError::Internal(_) => McpError::internal_error(err.to_string()),
        }
    }
}

/// MCP server over an immutable [`Registry`].
pub struct McpServer {
    /// Server configuration
    config: ServerConfig,

    /// Server info
    info: ServerInfo,

    /// Server capabilities
    capabilities: ServerCapabilities,

    /// Registered tools, resources, and prompts
    registry: Arc<Registry>,

    /// Collaborator slots
    clients: Arc<ClientManager>,
}

impl McpServer {
    /// Create a server backed by the process-wide client manager.
    ///
    /// The configured re-authentication policy is applied to that shared
    /// manager, so it also governs every other server built with `new`.
    pub fn new(config: ServerConfig, registry: Registry) -> Self {
        Self::with_clients(config, registry, ClientManager::process())
    }

    /// Create a server backed by the given client manager.
    ///
    /// Installs a slot for every collaborator type the registry knows and
    /// applies the configured re-authentication policy to `clients`. Servers
    /// sharing a manager share its policy; the last one built wins.
    pub fn with_clients(
        config: ServerConfig,
        registry: Registry,
        clients: Arc<ClientManager>,
    ) -> Self {
        for spec in registry.collaborators() {
            clients.install(spec);
        }
        clients.set_policy(config.reauth_policy);

        Self {
            info: ServerInfo {
                name: config.name.clone(),
                version: config.version.clone(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: false,
                }),
                resources: Some(ResourceCapabilities {
                    subscribe: false,
                    list_changed: false,
                }),
                prompts: Some(PromptCapabilities {
                    list_changed: false,
                }),
            },
            config,
            registry: Arc::new(registry),
            clients,
        }
    }

    /// Get server info.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Get server capabilities.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Get the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get the client manager.
    pub fn clients(&self) -> &Arc<ClientManager> {
        &self.clients
    }

    /// Handle a raw JSON request body.
    pub async fn handle_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<Value>(body) {
            Ok(envelope) => self.handle_value(envelope).await,
            Err(e) => {
                debug!(error = %e, "Rejecting unparseable envelope");
                encode(&McpResponse::error(RequestId::Null, McpError::parse_error(e)))
            }
        };
        response.to_string()
    }

    /// Handle one JSON-RPC envelope.
    pub async fn handle_value(&self, envelope: Value) -> Value {
        let response = match parse_envelope(envelope) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => response,
        };
        encode(&response)
    }

    /// Handle an MCP request.
    #[instrument(skip(self, request), fields(method = %request.method, id = ?request.id))]
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let McpRequest {
            id, method, params, ..
        } = request;

        let result = match method.as_str() {
            "initialize" => to_result(&self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.list_tools() })),
            "tools/call" => match parse_params::<ToolCall>(params) {
                Ok(call) => self
                    .call_tool(&call.name, call.arguments.unwrap_or_default())
                    .await
                    .and_then(|r| to_result(&r)),
                Err(e) => Err(e),
            },
            "resources/list" => Ok(json!({ "resources": self.list_resources() })),
            "resources/templates/list" => {
                Ok(json!({ "resourceTemplates": self.list_resource_templates() }))
            }
            "resources/read" => match parse_params::<ReadResourceParams>(params) {
                Ok(read) => self
                    .read_resource(&read.uri)
                    .await
                    .and_then(|r| to_result(&r)),
                Err(e) => Err(e),
            },
            "prompts/list" => Ok(json!({ "prompts": self.list_prompts() })),
            "prompts/get" => match parse_params::<GetPromptParams>(params) {
                Ok(get) => self
                    .get_prompt(&get.name, get.arguments.unwrap_or_default())
                    .await
                    .and_then(|r| to_result(&r)),
                Err(e) => Err(e),
            },
            _ => {
                debug!("Unknown method");
                return McpResponse::error(id, McpError::method_not_found(&method));
            }
        };

        match result {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => {
                debug!(error = %e, "Request failed");
                McpResponse::error(id, e.into())
            }
        }
    }

    /// Get all tool definitions, in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry
            .list_tools()
            .iter()
            .map(|t| t.definition())
            .collect()
    }

    /// Get all resource definitions, in registration order.
    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        self.registry
            .list_resources()
            .iter()
            .map(|r| r.definition())
            .collect()
    }

    /// Get the templated resource definitions, in registration order.
    pub fn list_resource_templates(&self) -> Vec<ResourceDefinition> {
        self.registry
            .list_resources()
            .iter()
            .filter(|r| r.uri_template().is_templated())
            .map(|r| r.definition())
            .collect()
    }

    /// Get all prompt definitions, in registration order.
    pub fn list_prompts(&self) -> Vec<PromptDefinition> {
        self.registry
            .list_prompts()
            .iter()
            .map(|p| p.definition())
            .collect()
    }

    /// Execute a tool.
    ///
    /// Only an unknown name is an error; every call-time failure is returned
    /// as a result with `is_error` set.
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> McpServerResult<ToolResult> {
        let tool = self.registry.find_tool(name)?;

        match invoke(
            &self.clients,
            tool.handler(),
            tool.parameters(),
            tool.collaborators(),
            &arguments,
        )
        .await
        {
            Ok(output) => Ok(ToolResult::content(output.into_content())),
            Err(e) => {
                warn!(error = %e, "Tool execution failed");
                Ok(ToolResult::error(e.to_string()))
            }
        }
    }

    /// Read a resource by concrete URI.
    #[instrument(skip(self))]
    pub async fn read_resource(&self, uri: &str) -> McpServerResult<ReadResourceResult> {
        let matched = self.registry.find_resource(uri)?;
        let resource = &matched.descriptor;
        let mime_type = resource.mime_type().to_string();

        match invoke(
            &self.clients,
            resource.handler(),
            resource.parameters(),
            resource.collaborators(),
            &matched.arguments,
        )
        .await
        {
            Ok(output) => Ok(ReadResourceResult {
                contents: output
                    .into_content()
                    .into_iter()
                    .map(|block| resource_contents(uri, &mime_type, block))
                    .collect(),
                is_error: false,
            }),
            Err(e) => {
                warn!(error = %e, "Resource read failed");
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents {
                        uri: uri.to_string(),
                        mime_type: Some(DEFAULT_RESOURCE_MIME_TYPE.to_string()),
                        text: e.to_string(),
                    }],
                    is_error: true,
                })
            }
        }
    }

    /// Render a prompt.
    ///
    /// A missing or invalid argument is an invalid-params error; a failing
    /// handler is an internal error.
    #[instrument(skip(self, arguments))]
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> McpServerResult<GetPromptResult> {
        let prompt = self.registry.find_prompt(name)?;
        let arguments = bind_arguments(prompt.parameters(), &arguments)
            .map_err(|e| McpServerError::InvalidParams(e.to_string()))?;

        let rendered = AssertUnwindSafe(prompt.handler().render(arguments))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(anyhow!(panic_message(payload))));

        let output = rendered.map_err(|e| {
            error!(error = %e, "Prompt rendering failed");
            McpServerError::Internal(e.to_string())
        })?;

        Ok(GetPromptResult {
            description: prompt.description().to_string(),
            messages: output.into_messages(),
        })
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.config.instructions.clone(),
        }
    }
}

/// Resolve collaborators, bind arguments, and run the handler.
///
/// Collaborators are resolved in declaration order and the first failure
/// aborts the call before arguments are bound or the handler runs. A panic
/// inside the handler is reported as a handler failure.
async fn invoke(
    clients: &ClientManager,
    handler: &dyn ToolHandler,
    parameters: &[ParameterDescriptor],
    collaborators: &[CollaboratorParam],
    arguments: &Map<String, Value>,
) -> Result<ToolOutput, InvocationError> {
    let mut resolved = Collaborators::default();
    for param in collaborators {
        let instance = clients.resolve_type(&param.collaborator).await?;
        resolved.push(param.name.clone(), param.collaborator, instance);
    }

    let arguments = bind_arguments(parameters, arguments)?;

    match AssertUnwindSafe(handler.call(Invocation::new(arguments, resolved)))
        .catch_unwind()
        .await
    {
        Ok(result) => result.map_err(InvocationError::Handler),
        Err(payload) => {
            let message = panic_message(payload);
            error!(panic = %message, "Handler panicked");
            Err(InvocationError::Handler(anyhow!(message)))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}

fn resource_contents(uri: &str, mime_type: &str, block: ContentBlock) -> ResourceContents {
    match block {
        ContentBlock::Resource { resource } => resource,
        ContentBlock::Text { text } => ResourceContents {
            uri: uri.to_string(),
            mime_type: Some(mime_type.to_string()),
            text,
        },
        ContentBlock::Image { data, mime_type } => ResourceContents {
            uri: uri.to_string(),
            mime_type: Some(mime_type),
            text: data,
        },
    }
}

/// Validate the envelope shape and extract a typed request.
fn parse_envelope(envelope: Value) -> Result<McpRequest, McpResponse> {
    let Value::Object(mut object) = envelope else {
        return Err(McpResponse::error(
            RequestId::Null,
            McpError::invalid_request("envelope must be a JSON object"),
        ));
    };

    let id = match object.get("id") {
        Some(raw) => RequestId::from_value(raw).ok_or_else(|| {
            McpResponse::error(
                RequestId::Null,
                McpError::invalid_request("id must be a string or an integer"),
            )
        })?,
        None => {
            return Err(McpResponse::error(
                RequestId::Null,
                McpError::invalid_request("missing id"),
            ))
        }
    };

    match object.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => {
            return Err(McpResponse::error(
                id,
                McpError::invalid_request("jsonrpc must be \"2.0\""),
            ))
        }
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => {
            return Err(McpResponse::error(
                id,
                McpError::invalid_request("missing method"),
            ))
        }
    };

    Ok(McpRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        method,
        params: object.remove("params").filter(|p| !p.is_null()),
    })
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpServerResult<T> {
    let params = params.ok_or_else(|| McpServerError::InvalidParams("Missing params".into()))?;
    serde_json::from_value(params).map_err(|e| McpServerError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(result: &T) -> McpServerResult<Value> {
    serde_json::to_value(result).map_err(|e| McpServerError::Internal(e.to_string()))
}

fn encode(response: &McpResponse) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": Value::Null,
            "error": { "code": McpError::INTERNAL_ERROR, "message": e.to_string() }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::introspect::Signature;
    use crate::registry::RegistryBuilder;

    fn server() -> McpServer {
        let mut builder = RegistryBuilder::new();
        builder
            .tool(
                "echo",
                "Echo a message",
                Signature::new().param::<String>("message"),
                from_fn(|inv: &Invocation| inv.arg::<String>("message")),
            )
            .unwrap();
        McpServer::with_clients(
            ServerConfig::new("test-server", "0.1.0"),
            builder.build(),
            Arc::new(ClientManager::new()),
        )
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = server();
        assert_eq!(server.info().name, "test-server");
        assert_eq!(server.list_tools().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server()
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .await;
        assert_eq!(response["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(response["result"]["serverInfo"]["name"], json!("test-server"));
        assert_eq!(
            response["result"]["capabilities"]["tools"]["listChanged"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_unknown_method_echoes_id() {
        let response = server()
            .handle_value(json!({"jsonrpc": "2.0", "id": "abc", "method": "tools/destroy"}))
            .await;
        assert_eq!(response["id"], json!("abc"));
        assert_eq!(response["error"]["code"], json!(-32601));
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_malformed_envelopes() {
        let server = server();

        let response = server.handle_json("{not json").await;
        let response: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], Value::Null);

        let response = server
            .handle_value(json!({"jsonrpc": "1.0", "id": 4, "method": "ping"}))
            .await;
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["id"], json!(4));

        let response = server.handle_value(json!({"jsonrpc": "2.0", "method": "ping"})).await;
        assert_eq!(response["error"]["code"], json!(-32600));

        let response = server.handle_value(json!({"jsonrpc": "2.0", "id": 5})).await;
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["id"], json!(5));

        let response = server.handle_value(json!([1, 2])).await;
        assert_eq!(response["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn test_tools_call_params() {
        let server = server();

        let response = server
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call"}))
            .await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = server
            .handle_value(json!({
                "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": {"name": "nope", "arguments": {}}
            }))
            .await;
        assert_eq!(response["error"]["code"], json!(-32602));
        assert_eq!(response["error"]["message"], json!("Tool not found: nope"));

        let response = server
            .handle_value(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"message": "hi"}}
            }))
            .await;
        assert_eq!(
            response["result"],
            json!({"content": [{"type": "text", "text": "hi"}], "isError": false})
        );
    }

    #[tokio::test]
    async fn test_ping() {
        let response = server()
            .handle_value(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
            .await;
        assert_eq!(response["result"], json!({}));
    }

    #[test]
    fn test_error_mapping() {
        let err: McpError = McpServerError::InvalidParams("bad".into()).into();
        assert_eq!(err.code, McpError::INVALID_PARAMS);
        assert_eq!(err.message, "Invalid parameters: bad");

        let err: McpError = McpServerError::Internal("boom".into()).into();
        assert_eq!(err.code, McpError::INTERNAL_ERROR);
    }
}
