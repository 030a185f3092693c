//! JSON-RPC method dispatch.
//!
//! Maps MCP methods onto the attached registries. Transports feed it raw
//! lines ([`Dispatcher::handle_message`]) or parsed requests
//! ([`Dispatcher::handle_request`]); notifications never get a response.

use crate::error::codes;
use crate::protocol::{
    CallToolParams, GetPromptParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcId,
    JsonRpcRequest, JsonRpcResponse, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, PromptsCapability, ReadResourceParams,
    ResourcesCapability, ServerCapabilities, ServerInfo, ToolCallResult, ToolsCapability,
    PROTOCOL_VERSION,
};
use crate::registry::{PromptRegistry, RequestContext, ResourceRegistry, ToolRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routes JSON-RPC requests to registries.
#[derive(Clone)]
pub struct Dispatcher {
    info: ServerInfo,
    instructions: Option<String>,
    tools: Option<Arc<ToolRegistry>>,
    resources: Option<Arc<ResourceRegistry>>,
    prompts: Option<Arc<PromptRegistry>>,
}

impl Dispatcher {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            instructions: None,
            tools: None,
            resources: None,
            prompts: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_resources(mut self, resources: Arc<ResourceRegistry>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<PromptRegistry>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Capabilities advertised for the attached registries.
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools.as_ref().map(|_| ToolsCapability::default()),
            resources: self
                .resources
                .as_ref()
                .map(|_| ResourcesCapability::default()),
            prompts: self.prompts.as_ref().map(|_| PromptsCapability::default()),
        }
    }

    /// Handle one raw message.
    ///
    /// Unparseable input yields a JSON-RPC parse error with a null id.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to parse message");
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(codes::PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };

        // Keep the id around so malformed requests can still be answered.
        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok());

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                id,
                JsonRpcError::new(codes::INVALID_REQUEST, format!("Invalid request: {e}")),
            )),
        }
    }

    /// Handle a parsed JSON-RPC request.
    #[allow(clippy::cognitive_complexity)]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = ?request.id, "Handling MCP request");

        // Notifications (no id) don't expect a response
        let Some(id) = request.id else {
            match request.method.as_str() {
                "notifications/initialized" => debug!("Received initialized notification"),
                "notifications/cancelled" => debug!("Received cancellation notification"),
                _ => debug!(method = %request.method, "Received unknown notification"),
            }
            return None;
        };

        let context = RequestContext::default().with_request_id(format!("rpc-{id}"));
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(json!({})),
            "server/info" => to_value(&self.info),
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params, context).await,
            "resources/list" => self.handle_list_resources().await,
            "resources/templates/list" => self.handle_list_resource_templates().await,
            "resources/read" => self.handle_read_resource(request.params, context).await,
            "prompts/list" => self.handle_list_prompts().await,
            "prompts/get" => self.handle_get_prompt(request.params, context).await,
            other => Err(JsonRpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(Some(id), value),
            Err(error) => JsonRpcResponse::error(Some(id), error),
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(invalid_params)?
            .unwrap_or_default();

        info!(
            name = %self.info.name,
            version = %self.info.version,
            client = ?params.client_info.as_ref().map(|c| c.name.as_str()),
            client_protocol = ?params.protocol_version,
            "Initializing MCP server"
        );

        to_value(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    async fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let tools = match &self.tools {
            Some(tools) => tools.list().await,
            None => Vec::new(),
        };
        debug!(count = tools.len(), "Listing MCP tools");
        to_value(&ListToolsResult { tools })
    }

    /// Tool failures are reported in-band as `isError` results so the
    /// client model can see them.
    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let Some(tools) = &self.tools else {
            return Err(method_not_found("tools/call"));
        };

        debug!(tool = %params.name, "Calling MCP tool");
        let args = params.arguments.unwrap_or_else(|| json!({}));
        let result = match tools.call(&params.name, args, context).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool failed");
                ToolCallResult::error(e.to_string())
            }
        };
        to_value(&result)
    }

    async fn handle_list_resources(&self) -> Result<Value, JsonRpcError> {
        let resources = match &self.resources {
            Some(resources) => resources.list().await,
            None => Vec::new(),
        };
        to_value(&ListResourcesResult { resources })
    }

    async fn handle_list_resource_templates(&self) -> Result<Value, JsonRpcError> {
        let resource_templates = match &self.resources {
            Some(resources) => resources.list_templates().await,
            None => Vec::new(),
        };
        to_value(&ListResourceTemplatesResult { resource_templates })
    }

    async fn handle_read_resource(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> Result<Value, JsonRpcError> {
        let params: ReadResourceParams = parse_params(params)?;
        let Some(resources) = &self.resources else {
            return Err(method_not_found("resources/read"));
        };

        let result = resources
            .read(&params.uri, context)
            .await
            .map_err(|e| e.to_rpc_error())?;
        to_value(&result)
    }

    async fn handle_list_prompts(&self) -> Result<Value, JsonRpcError> {
        let prompts = match &self.prompts {
            Some(prompts) => prompts.list().await,
            None => Vec::new(),
        };
        to_value(&ListPromptsResult { prompts })
    }

    async fn handle_get_prompt(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> Result<Value, JsonRpcError> {
        let params: GetPromptParams = parse_params(params)?;
        let Some(prompts) = &self.prompts else {
            return Err(method_not_found("prompts/get"));
        };

        let args = params.arguments.unwrap_or_else(|| json!({}));
        let result = prompts
            .render(&params.name, args, context)
            .await
            .map_err(|e| e.to_rpc_error())?;
        to_value(&result)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params =
        params.ok_or_else(|| JsonRpcError::new(codes::INVALID_PARAMS, "Missing params"))?;
    serde_json::from_value(params).map_err(invalid_params)
}

fn invalid_params(e: serde_json::Error) -> JsonRpcError {
    JsonRpcError::new(codes::INVALID_PARAMS, format!("Invalid params: {e}"))
}

fn method_not_found(method: &str) -> JsonRpcError {
    JsonRpcError::new(
        codes::METHOD_NOT_FOUND,
        format!("Method not found: {method}"),
    )
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        JsonRpcError::new(
            codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {e}"),
        )
    })
}
