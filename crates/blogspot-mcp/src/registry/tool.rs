//! Tools: named, schema-validated callables.

use super::{ExecutionContext, OperationKind, Registry, RequestContext};
use crate::error::{McpError, McpResult};
use crate::protocol::{McpTool, ToolCallResult};
use crate::schema::InputSchema;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// Executes a tool call with already validated arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolCallResult>;
}

struct FnToolHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ToolCallResult>> + Send,
{
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolCallResult> {
        (self.0)(args, ctx.clone()).await
    }
}

/// Wrap an async closure as a [`ToolHandler`].
pub fn tool_handler<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ToolCallResult>> + Send + 'static,
{
    Arc::new(FnToolHandler(f))
}

/// A registrable tool.
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// Service tag used for grouping, e.g. "blogger".
    pub service: Option<String>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            name: name.into(),
            description: None,
            input_schema: None,
            service: None,
            handler: None,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ToolDefinition`].
pub struct ToolDefinitionBuilder {
    name: String,
    description: Option<String>,
    input_schema: Option<InputSchema>,
    service: Option<String>,
    handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDefinitionBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the definition. Description, schema and handler are required.
    pub fn build(self) -> McpResult<ToolDefinition> {
        let description = self
            .description
            .ok_or_else(|| McpError::validation("Tool description is required"))?;
        let input_schema = self
            .input_schema
            .ok_or_else(|| McpError::validation("Tool input schema is required"))?;
        let handler = self
            .handler
            .ok_or_else(|| McpError::validation("Tool handler is required"))?;

        Ok(ToolDefinition {
            name: self.name,
            description,
            input_schema,
            service: self.service,
            handler,
        })
    }
}

/// Tool kind marker.
pub struct ToolKind;

impl OperationKind for ToolKind {
    const LABEL: &'static str = "Tool";
    const TAG: &'static str = "tool";
    const FAILURE: &'static str = "Tool execution failed";

    type Definition = ToolDefinition;
    type Listing = McpTool;

    fn name(definition: &ToolDefinition) -> &str {
        &definition.name
    }

    fn service(definition: &ToolDefinition) -> Option<&str> {
        definition.service.as_deref()
    }

    fn listing(definition: &ToolDefinition) -> McpTool {
        McpTool {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            input_schema: Some(definition.input_schema.to_json_schema()),
        }
    }

    fn check(definition: &ToolDefinition) -> McpResult<()> {
        if definition.description.trim().is_empty() {
            return Err(McpError::validation("Tool description is required"));
        }
        Ok(())
    }
}

impl Registry<ToolKind> {
    /// Validate `args` against the tool's schema and run its handler.
    ///
    /// `null` arguments are treated as an empty object.
    pub async fn call(
        &self,
        name: &str,
        args: Value,
        context: RequestContext,
    ) -> McpResult<ToolCallResult> {
        let entry = self
            .entry(name)
            .await
            .ok_or_else(|| McpError::not_found(ToolKind::LABEL, name))?;
        let args = if args.is_null() { json!({}) } else { args };

        let tool = entry.clone();
        self.execute(&entry, context, move |ctx| async move {
            let definition = tool.definition();
            definition.input_schema.validate(&args)?;
            definition.handler.call(args, &ctx).await
        })
        .await
    }
}
