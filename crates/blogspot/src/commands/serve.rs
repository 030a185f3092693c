//! Server command handler.
//!
//! Wires credentials, the blog id and the blogger operations into a
//! dispatcher and serves it through the init/start/stop lifecycle.

use super::auth::{ensure_credentials, session_for};
use crate::config::Config;
use blogspot_auth::CredentialStore;
use blogspot_blogger::{resolve_blog_id, BlogIdCache, BloggerClient, BloggerTools};
use blogspot_mcp::{
    serve_http, serve_stdio, Dispatcher, Lifecycle, McpHttpState, PromptRegistry,
    ResourceRegistry, ToolRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const SERVER_NAME: &str = "blogspot-mcp-server";

const INSTRUCTIONS: &str = "Write and publish posts on the configured Blogger blog. \
     New posts are saved as drafts unless isDraft is false.";

/// Transport the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP POST /mcp
    Http,
}

/// The three registries a server exposes.
#[derive(Clone, Default)]
pub struct Registries {
    pub tools: Arc<ToolRegistry>,
    pub resources: Arc<ResourceRegistry>,
    pub prompts: Arc<PromptRegistry>,
}

impl Registries {
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(SERVER_NAME, env!("CARGO_PKG_VERSION"))
            .with_instructions(INSTRUCTIONS)
            .with_tools(self.tools.clone())
            .with_resources(self.resources.clone())
            .with_prompts(self.prompts.clone())
    }
}

/// Run the server until the transport ends.
pub async fn run_server(
    config: Config,
    transport: Transport,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let registries = Registries::default();
    let dispatcher = Arc::new(registries.dispatcher());
    let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(config.port)));
    let api_key = config.session_secret.clone();

    let init = {
        let registries = registries.clone();
        move || async move {
            let session = Arc::new(session_for(&config.oauth));
            let store = Arc::new(CredentialStore::new());
            ensure_credentials(session.clone(), store.clone(), config.oauth.redirect_uri.clone())
                .await?;

            let client = Arc::new(BloggerClient::new(session.clone()));
            let blog_id = resolve_blog_id(
                client.as_ref(),
                &BlogIdCache::new(),
                config.blog_id.as_deref(),
                &config.blog_url,
            )
            .await?;
            info!(blog_id = %blog_id, blog_url = %config.blog_url, "Serving blog");

            Arc::new(BloggerTools::new(client, session, store).with_blog_id(Some(blog_id)))
                .register(&registries.tools, &registries.resources, &registries.prompts)
                .await?;
            Ok::<(), anyhow::Error>(())
        }
    };

    let start = move || async move {
        match transport {
            Transport::Stdio => {
                info!("Serving MCP over stdio");
                tokio::select! {
                    result = serve_stdio(dispatcher) => result?,
                    _ = shutdown_signal() => {}
                }
            }
            Transport::Http => {
                let state = McpHttpState::new(dispatcher).with_api_key(api_key);
                serve_http(state, addr, shutdown_signal()).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    };

    let stop = move || async move {
        let summary = registries.tools.manager_stats().await;
        let resources = registries.resources.len().await;
        let prompts = registries.prompts.len().await;
        info!(
            tools = summary.total,
            executions = summary.total_executions,
            errors = summary.total_errors,
            resources,
            prompts,
            "Server stopped"
        );
        Ok::<(), anyhow::Error>(())
    };

    Lifecycle::new(SERVER_NAME)
        .on_init(init)
        .on_start(start)
        .on_stop(stop)
        .run()
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, shutting down");
    }
}
