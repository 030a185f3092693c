//! Resources: readable content addressed by URI or URI template.

use super::{ExecutionContext, OperationKind, Registry, RequestContext};
use crate::error::{McpError, McpResult};
use crate::protocol::{McpResource, McpResourceTemplate, ReadResourceResult};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use url::Url;

/// A resolved read: the requested URI plus any template parameters.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub uri: Url,
    pub params: HashMap<String, String>,
}

impl ResourceRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Produces the content of a resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        request: ResourceRequest,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ReadResourceResult>;
}

struct FnResourceHandler<F>(F);

#[async_trait]
impl<F, Fut> ResourceHandler for FnResourceHandler<F>
where
    F: Fn(ResourceRequest, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send,
{
    async fn read(
        &self,
        request: ResourceRequest,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ReadResourceResult> {
        (self.0)(request, ctx.clone()).await
    }
}

/// Wrap an async closure as a [`ResourceHandler`].
pub fn resource_handler<F, Fut>(f: F) -> Arc<dyn ResourceHandler>
where
    F: Fn(ResourceRequest, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ReadResourceResult>> + Send + 'static,
{
    Arc::new(FnResourceHandler(f))
}

/// A registrable resource.
pub struct ResourceDefinition {
    pub name: String,
    /// Absolute URI, or a template with `{param}` segments and `*` wildcards.
    pub uri: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub service: Option<String>,
    pub handler: Arc<dyn ResourceHandler>,
}

impl ResourceDefinition {
    pub fn new(
        name: impl Into<String>,
        uri: impl Into<String>,
        handler: Arc<dyn ResourceHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            description: None,
            mime_type: None,
            service: None,
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn is_template(&self) -> bool {
        UriPattern::looks_templated(&self.uri)
    }
}

/// Compiled form of a resource URI.
///
/// `{name}` matches one path segment and captures it, percent-decoded, as
/// `name`; `*` matches anything. Everything else matches literally.
#[derive(Debug, Clone)]
pub struct UriPattern {
    regex: Regex,
    params: Vec<String>,
}

impl UriPattern {
    fn looks_templated(uri: &str) -> bool {
        uri.contains('{') || uri.contains('*')
    }

    /// Compile a URI or URI template.
    pub fn parse(uri: &str) -> McpResult<Self> {
        let invalid = || McpError::validation(format!("Invalid resource URI: '{uri}'"));

        // `sample` is the URI with every placeholder filled in, so templates
        // get the same syntax check as plain URIs.
        let mut pattern = String::from("^");
        let mut sample = String::new();
        let mut params = Vec::new();
        let mut rest = uri;
        while let Some(pos) = rest.find(['{', '*']) {
            pattern.push_str(&regex::escape(&rest[..pos]));
            sample.push_str(&rest[..pos]);
            sample.push('x');
            if rest[pos..].starts_with('*') {
                pattern.push_str(".*");
                rest = &rest[pos + 1..];
                continue;
            }

            let close = rest[pos..].find('}').ok_or_else(invalid)? + pos;
            let name = &rest[pos + 1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid());
            }
            pattern.push_str("([^/]+)");
            params.push(name.to_string());
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid());
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');
        sample.push_str(rest);
        Url::parse(&sample).map_err(|_| invalid())?;

        let regex = Regex::new(&pattern).map_err(|_| invalid())?;
        Ok(Self { regex, params })
    }

    /// Match `uri`, returning the captured parameters.
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        Some(
            self.params
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    let raw = captures.get(i + 1)?.as_str();
                    let value = urlencoding::decode(raw)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    Some((name.clone(), value))
                })
                .collect(),
        )
    }
}

/// Resource kind marker.
pub struct ResourceKind;

impl OperationKind for ResourceKind {
    const LABEL: &'static str = "Resource";
    const TAG: &'static str = "resource";
    const FAILURE: &'static str = "Resource access failed";

    type Definition = ResourceDefinition;
    type Listing = McpResource;

    fn name(definition: &ResourceDefinition) -> &str {
        &definition.name
    }

    fn service(definition: &ResourceDefinition) -> Option<&str> {
        definition.service.as_deref()
    }

    fn listing(definition: &ResourceDefinition) -> McpResource {
        McpResource {
            uri: definition.uri.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            mime_type: definition.mime_type.clone(),
        }
    }

    fn check(definition: &ResourceDefinition) -> McpResult<()> {
        if definition.uri.is_empty() {
            return Err(McpError::validation("Resource URI is required"));
        }
        UriPattern::parse(&definition.uri).map(|_| ())
    }
}

impl Registry<ResourceKind> {
    /// Templated resources, as listed by `resources/templates/list`.
    pub async fn list_templates(&self) -> Vec<McpResourceTemplate> {
        self.ordered()
            .await
            .iter()
            .map(|entry| entry.definition())
            .filter(|definition| definition.is_template())
            .map(|definition| McpResourceTemplate {
                uri_template: definition.uri.clone(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                mime_type: definition.mime_type.clone(),
            })
            .collect()
    }

    /// Read the resource addressed by `uri`.
    ///
    /// Lookup order: exact URI, then templates in registration order, then
    /// the last path segment of `uri` taken as a resource name.
    pub async fn read(&self, uri: &str, context: RequestContext) -> McpResult<ReadResourceResult> {
        let (entry, params) = self
            .resolve(uri)
            .await
            .ok_or_else(|| McpError::not_found(ResourceKind::LABEL, uri))?;

        let resource = entry.clone();
        let uri = uri.to_string();
        self.execute(&entry, context, move |ctx| async move {
            let uri = Url::parse(&uri)
                .map_err(|e| McpError::validation(format!("Invalid resource URI '{uri}': {e}")))?;
            let request = ResourceRequest { uri, params };
            resource.definition().handler.read(request, &ctx).await
        })
        .await
    }

    async fn resolve(
        &self,
        uri: &str,
    ) -> Option<(Arc<super::RegistryEntry<ResourceKind>>, HashMap<String, String>)> {
        let entries = self.ordered().await;

        if let Some(entry) = entries.iter().find(|e| e.definition().uri == uri) {
            return Some((entry.clone(), HashMap::new()));
        }

        for entry in entries.iter().filter(|e| e.definition().is_template()) {
            let Ok(pattern) = UriPattern::parse(&entry.definition().uri) else {
                continue;
            };
            if let Some(params) = pattern.matches(uri) {
                return Some((entry.clone(), params));
            }
        }

        let name = Url::parse(uri).ok().and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })?;
        entries
            .into_iter()
            .find(|e| e.name() == name)
            .map(|entry| (entry, HashMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResourceContent;
    use crate::registry::ResourceRegistry;

    fn echo_handler() -> Arc<dyn ResourceHandler> {
        resource_handler(|request, _ctx| async move {
            let id = request.param("id").unwrap_or("-").to_string();
            Ok(ReadResourceResult {
                contents: vec![ResourceContent::text(
                    request.uri.as_str(),
                    Some("text/plain".to_string()),
                    id,
                )],
            })
        })
    }

    fn text_of(result: &ReadResourceResult) -> &str {
        result.contents[0].text.as_deref().unwrap()
    }

    #[test]
    fn test_uri_pattern_captures_params() {
        let pattern = UriPattern::parse("test://items/{id}").unwrap();
        let params = pattern.matches("test://items/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        assert!(pattern.matches("test://items/42/extra").is_none());
        assert!(pattern.matches("test://items/").is_none());
    }

    #[test]
    fn test_uri_pattern_wildcard_and_literals() {
        let pattern = UriPattern::parse("file:///logs/*.log").unwrap();
        assert!(pattern.matches("file:///logs/a/b.log").is_some());
        // The dot is literal.
        assert!(pattern.matches("file:///logs/axlog").is_none());
    }

    #[test]
    fn test_uri_pattern_rejects_garbage() {
        assert!(UriPattern::parse("not a uri").is_err());
        assert!(UriPattern::parse("test://items/{id").is_err());
        assert!(UriPattern::parse("test://items/{}").is_err());
        assert!(UriPattern::parse("test://items/id}").is_err());
        assert!(UriPattern::parse("not a uri/{id}").is_err());
        assert!(UriPattern::parse("*").is_err());
    }

    #[test]
    fn test_uri_pattern_decodes_params() {
        let pattern = UriPattern::parse("test://items/{id}").unwrap();
        let params = pattern.matches("test://items/a%2Fb%20c").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("a/b c"));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_uri() {
        let registry = ResourceRegistry::new();
        let err = registry
            .register(ResourceDefinition::new("bad", "no scheme here", echo_handler()))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Validation(_)));

        let err = registry
            .register(ResourceDefinition::new("bad", "not a uri/{id}", echo_handler()))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Validation(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_read_exact_uri() {
        let registry = ResourceRegistry::new();
        registry
            .register(ResourceDefinition::new("readme", "test://docs/readme", echo_handler()))
            .await
            .unwrap();

        let result = registry
            .read("test://docs/readme", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(text_of(&result), "-");
        assert_eq!(result.contents[0].uri, "test://docs/readme");
    }

    #[tokio::test]
    async fn test_read_template_passes_params() {
        let registry = ResourceRegistry::new();
        registry
            .register(ResourceDefinition::new("item", "test://items/{id}", echo_handler()))
            .await
            .unwrap();

        let result = registry
            .read("test://items/42", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(text_of(&result), "42");

        let result = registry
            .read("test://items/a%2Fb", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(text_of(&result), "a/b");
    }

    #[tokio::test]
    async fn test_read_falls_back_to_name() {
        let registry = ResourceRegistry::new();
        registry
            .register(ResourceDefinition::new("status", "test://server/status", echo_handler()))
            .await
            .unwrap();

        let result = registry
            .read("other://anything/status", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(result.contents[0].uri, "other://anything/status");
    }

    #[tokio::test]
    async fn test_read_unknown_uri() {
        let registry = ResourceRegistry::new();
        let err = registry
            .read("test://nothing/here", RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Resource 'test://nothing/here' not found");
    }

    #[tokio::test]
    async fn test_handler_failure_is_wrapped() {
        let registry = ResourceRegistry::new();
        registry
            .register(ResourceDefinition::new(
                "broken",
                "test://broken",
                resource_handler(|_, _| async { Err(anyhow::anyhow!("disk gone")) }),
            ))
            .await
            .unwrap();

        let err = registry
            .read("test://broken", RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Resource access failed: disk gone");
        assert_eq!(registry.stats("broken").await.unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_list_templates() {
        let registry = ResourceRegistry::new();
        registry
            .register(ResourceDefinition::new("readme", "test://docs/readme", echo_handler()))
            .await
            .unwrap();
        registry
            .register(
                ResourceDefinition::new("item", "test://items/{id}", echo_handler())
                    .with_mime_type("application/json"),
            )
            .await
            .unwrap();

        assert_eq!(registry.list().await.len(), 2);
        let templates = registry.list_templates().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].uri_template, "test://items/{id}");
        assert_eq!(templates[0].mime_type.as_deref(), Some("application/json"));
    }
}
