//! Prompts: named message templates with declared arguments.

use super::{ExecutionContext, OperationKind, Registry, RequestContext};
use crate::error::{McpError, McpResult};
use crate::protocol::{GetPromptResult, McpPrompt, PromptMessage};
use crate::schema::{validate_arguments, PromptArgument};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Renders prompt messages from validated arguments.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(
        &self,
        args: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<PromptMessage>>;
}

struct FnPromptHandler<F>(F);

#[async_trait]
impl<F, Fut> PromptHandler for FnPromptHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<PromptMessage>>> + Send,
{
    async fn render(
        &self,
        args: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Vec<PromptMessage>> {
        (self.0)(args, ctx.clone()).await
    }
}

/// Wrap an async closure as a [`PromptHandler`].
pub fn prompt_handler<F, Fut>(f: F) -> Arc<dyn PromptHandler>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<PromptMessage>>> + Send + 'static,
{
    Arc::new(FnPromptHandler(f))
}

/// A registrable prompt.
pub struct PromptDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
    pub service: Option<String>,
    pub handler: Arc<dyn PromptHandler>,
}

impl PromptDefinition {
    pub fn new(name: impl Into<String>, handler: Arc<dyn PromptHandler>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            service: None,
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Prompt kind marker.
pub struct PromptKind;

impl OperationKind for PromptKind {
    const LABEL: &'static str = "Prompt";
    const TAG: &'static str = "prompt";
    const FAILURE: &'static str = "Prompt execution failed";

    type Definition = PromptDefinition;
    type Listing = McpPrompt;

    fn name(definition: &PromptDefinition) -> &str {
        &definition.name
    }

    fn service(definition: &PromptDefinition) -> Option<&str> {
        definition.service.as_deref()
    }

    fn listing(definition: &PromptDefinition) -> McpPrompt {
        McpPrompt {
            name: definition.name.clone(),
            description: definition.description.clone(),
            arguments: definition
                .arguments
                .iter()
                .map(PromptArgument::listing)
                .collect(),
        }
    }

    fn check(definition: &PromptDefinition) -> McpResult<()> {
        let mut seen = std::collections::HashSet::new();
        for argument in &definition.arguments {
            if argument.name.is_empty() {
                return Err(McpError::validation("Prompt argument name is required"));
            }
            if !seen.insert(argument.name.as_str()) {
                return Err(McpError::validation(format!(
                    "Prompt argument '{}' is declared twice",
                    argument.name
                )));
            }
        }
        Ok(())
    }
}

impl Registry<PromptKind> {
    /// Validate `args` against the declared arguments and render the prompt.
    pub async fn render(
        &self,
        name: &str,
        args: Value,
        context: RequestContext,
    ) -> McpResult<GetPromptResult> {
        let entry = self
            .entry(name)
            .await
            .ok_or_else(|| McpError::not_found(PromptKind::LABEL, name))?;

        let prompt = entry.clone();
        self.execute(&entry, context, move |ctx| async move {
            let definition = prompt.definition();
            if !definition.arguments.is_empty() {
                validate_arguments(&definition.arguments, &args)?;
            }
            let messages = definition.handler.render(args, &ctx).await?;
            Ok(GetPromptResult {
                description: definition.description.clone(),
                messages,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Role, ToolContent};
    use crate::registry::PromptRegistry;
    use crate::schema::ArgumentKind;
    use serde_json::json;

    async fn greeting_registry() -> PromptRegistry {
        let registry = PromptRegistry::new();
        let prompt = PromptDefinition::new(
            "greeting",
            prompt_handler(|args, _ctx| async move {
                let who = args["name"].as_str().unwrap_or_default().to_string();
                Ok(vec![PromptMessage::user(format!("Say hello to {who}"))])
            }),
        )
        .with_description("Greet someone")
        .with_argument(PromptArgument::required("name").describe("Who to greet"))
        .with_argument(PromptArgument::optional("times").of_kind(ArgumentKind::Number));
        registry.register(prompt).await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_render_prompt() {
        let registry = greeting_registry().await;
        let result = registry
            .render("greeting", json!({"name": "Ada"}), RequestContext::default())
            .await
            .unwrap();

        assert_eq!(result.description.as_deref(), Some("Greet someone"));
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(
            result.messages[0].content,
            ToolContent::text("Say hello to Ada")
        );
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let registry = greeting_registry().await;
        let err = registry
            .render("greeting", json!({}), RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Required argument 'name' is missing");
        assert_eq!(err.code(), crate::error::codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_non_object_parameters() {
        let registry = greeting_registry().await;
        let err = registry
            .render("greeting", json!(["Ada"]), RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Prompt parameters must be an object");
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let registry = greeting_registry().await;
        let err = registry
            .render(
                "greeting",
                json!({"name": "Ada", "times": "twice"}),
                RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Argument 'times' must be a number");
    }

    #[tokio::test]
    async fn test_listing_arguments() {
        let registry = greeting_registry().await;
        let listed = registry.get("greeting").await.unwrap();
        assert_eq!(listed.arguments.len(), 2);
        assert!(listed.arguments[0].required);
        assert!(!listed.arguments[1].required);
        assert_eq!(listed.arguments[0].description.as_deref(), Some("Who to greet"));
    }

    #[tokio::test]
    async fn test_duplicate_argument_rejected() {
        let registry = PromptRegistry::new();
        let prompt = PromptDefinition::new(
            "dupe",
            prompt_handler(|_, _| async { Ok(Vec::new()) }),
        )
        .with_argument(PromptArgument::required("a"))
        .with_argument(PromptArgument::optional("a"));
        assert!(registry.register(prompt).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_prompt() {
        let registry = PromptRegistry::new();
        let err = registry
            .render("nope", json!({}), RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Prompt 'nope' not found");
    }
}
