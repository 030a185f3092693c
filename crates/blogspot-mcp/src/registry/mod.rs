//! Operation registries.
//!
//! One generic engine, [`Registry`], backs all three kinds of callable
//! operations the server exposes. A kind ([`ToolKind`], [`ResourceKind`],
//! [`PromptKind`]) supplies its definition type, its listing projection and
//! its kind-specific registration checks. The engine owns naming rules,
//! uniqueness, insertion order, usage statistics and the uniform
//! execute-with-error-normalization path.

mod prompt;
mod resource;
mod tool;

pub use prompt::{prompt_handler, PromptDefinition, PromptHandler, PromptKind};
pub use resource::{
    resource_handler, ResourceDefinition, ResourceHandler, ResourceKind, ResourceRequest,
    UriPattern,
};
pub use tool::{tool_handler, ToolDefinition, ToolDefinitionBuilder, ToolHandler, ToolKind};

use crate::error::{McpError, McpResult};
use blogspot_util::{Identifier, TimingGuard};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Registry of tools.
pub type ToolRegistry = Registry<ToolKind>;
/// Registry of resources.
pub type ResourceRegistry = Registry<ResourceKind>;
/// Registry of prompts.
pub type PromptRegistry = Registry<PromptKind>;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid name regex"));

/// A kind of registrable operation.
pub trait OperationKind: Send + Sync + 'static {
    /// Capitalized label used in messages: "Tool", "Resource", "Prompt".
    const LABEL: &'static str;
    /// Lowercase tag used in logs and timings.
    const TAG: &'static str;
    /// Prefix for wrapped handler failures, e.g. "Tool execution failed".
    const FAILURE: &'static str;

    type Definition: Send + Sync + 'static;
    type Listing: Clone + Serialize + Send;

    fn name(definition: &Self::Definition) -> &str;
    fn service(definition: &Self::Definition) -> Option<&str>;
    fn listing(definition: &Self::Definition) -> Self::Listing;

    /// Kind-specific registration checks beyond the shared name rules.
    fn check(definition: &Self::Definition) -> McpResult<()>;
}

/// Caller-supplied context for one execution.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Context handed to a handler.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Name of the operation being executed.
    pub operation: String,
    pub request_id: String,
    pub user_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ExecutionContext {
    fn new(operation: &str, context: RequestContext) -> Self {
        Self {
            operation: operation.to_string(),
            request_id: context.request_id.unwrap_or_else(Identifier::request),
            user_id: context.user_id,
            metadata: context.metadata,
        }
    }
}

#[derive(Debug, Default)]
struct Usage {
    usage_count: u64,
    error_count: u64,
    last_used: Option<DateTime<Utc>>,
    last_duration: Option<Duration>,
}

/// A registered definition plus its bookkeeping.
pub struct RegistryEntry<K: OperationKind> {
    definition: K::Definition,
    registered_at: DateTime<Utc>,
    usage: Mutex<Usage>,
}

impl<K: OperationKind> RegistryEntry<K> {
    fn new(definition: K::Definition) -> Self {
        Self {
            definition,
            registered_at: Utc::now(),
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn definition(&self) -> &K::Definition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        K::name(&self.definition)
    }

    fn record(&self, success: bool, elapsed: Duration) {
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage.usage_count += 1;
        if !success {
            usage.error_count += 1;
        }
        usage.last_used = Some(Utc::now());
        usage.last_duration = Some(elapsed);
    }

    fn stats(&self) -> OperationStats {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        OperationStats {
            name: self.name().to_string(),
            service: K::service(&self.definition).map(str::to_string),
            usage_count: usage.usage_count,
            error_count: usage.error_count,
            last_used: usage.last_used,
            last_duration_ms: usage.last_duration.map(|d| d.as_millis() as u64),
            registered_at: self.registered_at,
        }
    }
}

/// Usage statistics for one registered operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Every execution attempt, including ones rejected by validation.
    pub usage_count: u64,
    pub error_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub registered_at: DateTime<Utc>,
}

/// Aggregate statistics over a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub total: usize,
    pub total_executions: u64,
    pub total_errors: u64,
    /// Registered operations per service tag; untagged ones count as "default".
    pub by_service: BTreeMap<String, usize>,
}

struct Entries<K: OperationKind> {
    by_name: HashMap<String, Arc<RegistryEntry<K>>>,
    order: Vec<String>,
}

/// Name-keyed registry of one kind of operation.
///
/// Listing follows insertion order.
pub struct Registry<K: OperationKind> {
    entries: RwLock<Entries<K>>,
}

impl<K: OperationKind> Registry<K> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                by_name: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Register a definition.
    ///
    /// Fails when the name is empty or malformed, when the kind-specific
    /// checks reject the definition, or when the name is taken.
    pub async fn register(&self, definition: K::Definition) -> McpResult<()> {
        let name = K::name(&definition).to_string();
        validate_name(K::LABEL, &name)?;
        K::check(&definition)?;

        let mut entries = self.entries.write().await;
        if entries.by_name.contains_key(&name) {
            return Err(McpError::already_registered(K::LABEL, name));
        }

        debug!(kind = K::TAG, name = %name, service = ?K::service(&definition), "Registered");
        entries
            .by_name
            .insert(name.clone(), Arc::new(RegistryEntry::new(definition)));
        entries.order.push(name);
        Ok(())
    }

    /// Remove a definition. Returns whether it existed.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.by_name.remove(name).is_some();
        if removed {
            entries.order.retain(|n| n != name);
            debug!(kind = K::TAG, name = %name, "Unregistered");
        }
        removed
    }

    /// Listing of a single definition.
    pub async fn get(&self, name: &str) -> Option<K::Listing> {
        let entries = self.entries.read().await;
        entries
            .by_name
            .get(name)
            .map(|entry| K::listing(&entry.definition))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.by_name.contains_key(name)
    }

    /// Listings of all definitions, in registration order.
    pub async fn list(&self) -> Vec<K::Listing> {
        self.ordered()
            .await
            .iter()
            .map(|entry| K::listing(&entry.definition))
            .collect()
    }

    /// Listings of the definitions tagged with `service`.
    pub async fn by_service(&self, service: &str) -> Vec<K::Listing> {
        self.ordered()
            .await
            .iter()
            .filter(|entry| K::service(&entry.definition) == Some(service))
            .map(|entry| K::listing(&entry.definition))
            .collect()
    }

    pub async fn names(&self) -> Vec<String> {
        self.entries.read().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every definition.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.by_name.clear();
        entries.order.clear();
    }

    /// Statistics for one definition.
    pub async fn stats(&self, name: &str) -> Option<OperationStats> {
        let entries = self.entries.read().await;
        entries.by_name.get(name).map(|entry| entry.stats())
    }

    /// Statistics for every definition, in registration order.
    pub async fn all_stats(&self) -> Vec<OperationStats> {
        self.ordered()
            .await
            .iter()
            .map(|entry| entry.stats())
            .collect()
    }

    /// Totals across the registry.
    pub async fn manager_stats(&self) -> RegistrySummary {
        let mut summary = RegistrySummary::default();
        for stats in self.all_stats().await {
            summary.total += 1;
            summary.total_executions += stats.usage_count;
            summary.total_errors += stats.error_count;
            let service = stats.service.unwrap_or_else(|| "default".to_string());
            *summary.by_service.entry(service).or_default() += 1;
        }
        summary
    }

    pub(crate) async fn entry(&self, name: &str) -> Option<Arc<RegistryEntry<K>>> {
        self.entries.read().await.by_name.get(name).cloned()
    }

    pub(crate) async fn ordered(&self) -> Vec<Arc<RegistryEntry<K>>> {
        let entries = self.entries.read().await;
        entries
            .order
            .iter()
            .filter_map(|name| entries.by_name.get(name).cloned())
            .collect()
    }

    /// Run one execution of `entry`.
    ///
    /// Records usage, times the call and normalizes failures: an
    /// [`McpError`] raised by the body is kept as is, any other error is
    /// wrapped as an internal error carrying the original message, and a
    /// panic becomes an internal "unknown error".
    pub(crate) async fn execute<T, F, Fut>(
        &self,
        entry: &RegistryEntry<K>,
        context: RequestContext,
        body: F,
    ) -> McpResult<T>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let context = ExecutionContext::new(entry.name(), context);
        let request_id = context.request_id.clone();
        let timing = TimingGuard::new(K::TAG, entry.name());

        let outcome = AssertUnwindSafe(body(context)).catch_unwind().await;
        let elapsed = timing.finish();

        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(normalize::<K>(error)),
            Err(_) => Err(McpError::internal(format!(
                "{} with unknown error",
                K::FAILURE
            ))),
        };

        entry.record(result.is_ok(), elapsed);
        if let Err(e) = &result {
            warn!(
                kind = K::TAG,
                name = %entry.name(),
                request_id = %request_id,
                error = %e,
                "Execution failed"
            );
        }
        result
    }
}

impl<K: OperationKind> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(label: &str, name: &str) -> McpResult<()> {
    if name.is_empty() {
        return Err(McpError::validation(format!("{label} name is required")));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(McpError::validation(format!(
            "{label} name '{name}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

fn normalize<K: OperationKind>(error: anyhow::Error) -> McpError {
    match error.downcast::<McpError>() {
        Ok(mcp) => mcp,
        Err(other) => McpError::internal(format!("{}: {other:#}", K::FAILURE)),
    }
}
