//! Blog operations exposed over MCP.
//!
//! Every operation first checks that a credential is stored, then that a
//! blog id is configured, and refreshes the access token when needed.
//! Tools report these failures as error envelopes; the resource reports
//! them as read errors.

use crate::client::BloggerService;
use crate::ops::{batch_create_posts, BATCH_DELAY};
use crate::types::{null_as_default, BlogPost, PostListOptions, PostResponse, PostStatus};
use blogspot_auth::{AuthSession, CredentialStore};
use blogspot_mcp::{
    prompt_handler, resource_handler, tool_handler, ArgumentKind, FieldKind, FieldSpec,
    InputSchema, McpResult, PromptArgument, PromptDefinition, PromptMessage, PromptRegistry,
    ReadResourceResult, ResourceContent, ResourceDefinition, ResourceRegistry, ResourceRequest,
    ToolCallResult, ToolContent, ToolDefinition, ToolRegistry,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Service tag for everything registered here.
pub const SERVICE: &str = "blogger";

/// URI template of the post resource.
pub const POST_RESOURCE_URI: &str = "blogger://posts/{postId}";

pub const NO_CREDENTIAL_MESSAGE: &str =
    "No credential found. Complete authentication first (run `blogspot auth login`).";

pub const NO_BLOG_ID_MESSAGE: &str =
    "No blog id configured on the server (set BLOG_ID or BLOG_URL).";

#[derive(Deserialize)]
struct BatchArgs {
    posts: Vec<BlogPost>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    labels: Vec<String>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    post_id: String,
    #[serde(flatten)]
    post: BlogPost,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostIdArgs {
    post_id: String,
}

/// The blog tools, resource and prompt, bound to one blog.
pub struct BloggerTools {
    service: Arc<dyn BloggerService>,
    session: Arc<AuthSession>,
    store: Arc<CredentialStore>,
    blog_id: Option<String>,
    batch_delay: Duration,
}

impl BloggerTools {
    pub fn new(
        service: Arc<dyn BloggerService>,
        session: Arc<AuthSession>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            service,
            session,
            store,
            blog_id: None,
            batch_delay: BATCH_DELAY,
        }
    }

    pub fn with_blog_id(mut self, blog_id: Option<String>) -> Self {
        self.blog_id = blog_id.filter(|id| !id.is_empty());
        self
    }

    /// Pause between posts of a batch.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Check credential, blog id and token validity, in that order.
    ///
    /// Returns the blog id, or a message meant for the caller.
    async fn authorize(&self) -> Result<String, String> {
        let Some(stored) = self.store.load().await else {
            warn!("Blog operation rejected: no stored credential");
            return Err(NO_CREDENTIAL_MESSAGE.to_string());
        };
        let Some(blog_id) = self.blog_id.clone() else {
            warn!("Blog operation rejected: no blog id configured");
            return Err(NO_BLOG_ID_MESSAGE.to_string());
        };

        // The file may have been rewritten by `auth login` since startup.
        self.session.set_credentials(stored).await;
        match self.session.ensure_valid().await {
            Ok(None) => {}
            Ok(Some(refreshed)) => {
                if let Err(e) = self.store.save(&refreshed).await {
                    warn!(error = %e, "Refreshed token could not be persisted");
                }
            }
            Err(e) if e.requires_reauth() => {
                return Err(format!(
                    "Authentication expired. Run `blogspot auth login` to re-authenticate. ({})",
                    e
                ));
            }
            Err(e) => return Err(format!("Authentication check failed: {}", e)),
        }
        Ok(blog_id)
    }

    async fn create_post(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let blog_id = match self.authorize().await {
            Ok(id) => id,
            Err(message) => return Ok(ToolCallResult::error(message)),
        };
        let post: BlogPost = serde_json::from_value(args)?;

        match self.service.create_post(&blog_id, &post).await {
            Ok(created) => Ok(ToolCallResult::text(posted("Post created!", &created, &post))),
            Err(e) => {
                error!(title = %post.title, error = %e, "Post creation failed");
                Ok(ToolCallResult::error(format!("Post creation failed: {}", e)))
            }
        }
    }

    async fn batch_post(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let blog_id = match self.authorize().await {
            Ok(id) => id,
            Err(message) => return Ok(ToolCallResult::error(message)),
        };
        let BatchArgs { posts } = serde_json::from_value(args)?;

        let results =
            batch_create_posts(self.service.as_ref(), &blog_id, &posts, self.batch_delay).await;
        let failed = results.iter().filter(|r| !r.success).count();
        let succeeded = results.len() - failed;

        Ok(ToolCallResult {
            content: vec![
                ToolContent::text(format!(
                    "Batch posting complete! Succeeded: {}, Failed: {}",
                    succeeded, failed
                )),
                ToolContent::text(serde_json::to_string_pretty(&results)?),
            ],
            is_error: failed > 0,
        })
    }

    async fn list_posts(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let blog_id = match self.authorize().await {
            Ok(id) => id,
            Err(message) => return Ok(ToolCallResult::error(message)),
        };
        let args: ListArgs = serde_json::from_value(args)?;

        let status = match args.status.as_deref().map(str::parse::<PostStatus>) {
            None => Vec::new(),
            Some(Ok(status)) => vec![status],
            Some(Err(message)) => return Ok(ToolCallResult::error(message)),
        };
        let options = PostListOptions {
            status,
            max_results: args.max_results,
            labels: args.labels,
            page_token: args.page_token,
            fetch_bodies: Some(false),
            ..Default::default()
        };

        match self.service.list_posts(&blog_id, &options).await {
            Ok(list) => {
                let mut text = format!("Found {} posts", list.items.len());
                for post in &list.items {
                    let _ = write!(
                        text,
                        "\n- [{}] {}",
                        post.id,
                        post.title.as_deref().unwrap_or("(untitled)")
                    );
                    if let Some(ref status) = post.status {
                        let _ = write!(text, " ({})", status.to_lowercase());
                    }
                    if let Some(ref url) = post.url {
                        let _ = write!(text, " {}", url);
                    }
                }
                if let Some(token) = list.next_page_token {
                    let _ = write!(text, "\nNext page token: {}", token);
                }
                Ok(ToolCallResult::text(text))
            }
            Err(e) => Ok(ToolCallResult::error(format!("Listing posts failed: {}", e))),
        }
    }

    async fn update_post(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let blog_id = match self.authorize().await {
            Ok(id) => id,
            Err(message) => return Ok(ToolCallResult::error(message)),
        };
        let UpdateArgs { post_id, post } = serde_json::from_value(args)?;

        match self.service.update_post(&blog_id, &post_id, &post).await {
            Ok(updated) => Ok(ToolCallResult::text(posted("Post updated!", &updated, &post))),
            Err(e) => {
                error!(post_id = %post_id, error = %e, "Post update failed");
                Ok(ToolCallResult::error(format!("Post update failed: {}", e)))
            }
        }
    }

    async fn delete_post(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let blog_id = match self.authorize().await {
            Ok(id) => id,
            Err(message) => return Ok(ToolCallResult::error(message)),
        };
        let PostIdArgs { post_id } = serde_json::from_value(args)?;

        match self.service.delete_post(&blog_id, &post_id).await {
            Ok(()) => Ok(ToolCallResult::text(format!("Post {} deleted.", post_id))),
            Err(e) => Ok(ToolCallResult::error(format!("Post deletion failed: {}", e))),
        }
    }

    async fn read_post(&self, request: ResourceRequest) -> anyhow::Result<ReadResourceResult> {
        let blog_id = self.authorize().await.map_err(anyhow::Error::msg)?;
        let post_id = request
            .param("postId")
            .ok_or_else(|| anyhow::anyhow!("Missing post id in {}", request.uri))?;

        let post = self.service.get_post(&blog_id, post_id).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContent::text(
                request.uri.to_string(),
                Some("application/json".to_string()),
                serde_json::to_string_pretty(&post)?,
            )],
        })
    }

    /// Register the five blog tools, the post resource and the draft prompt.
    pub async fn register(
        self: Arc<Self>,
        tools: &ToolRegistry,
        resources: &ResourceRegistry,
        prompts: &PromptRegistry,
    ) -> McpResult<()> {
        for definition in self.tool_definitions()? {
            tools.register(definition).await?;
        }

        let this = self.clone();
        resources
            .register(
                ResourceDefinition::new(
                    "blogger-post",
                    POST_RESOURCE_URI,
                    resource_handler(move |request, _ctx| {
                        let this = this.clone();
                        async move { this.read_post(request).await }
                    }),
                )
                .with_description("A post of the configured blog, as Blogger JSON")
                .with_mime_type("application/json")
                .with_service(SERVICE),
            )
            .await?;

        prompts.register(draft_prompt()).await?;

        info!(blog_id = ?self.blog_id, "Registered blogger operations");
        Ok(())
    }

    fn tool_definitions(self: &Arc<Self>) -> McpResult<Vec<ToolDefinition>> {
        let post_fields = || {
            vec![
                FieldSpec::string("title").describe("Post title"),
                FieldSpec::string("content").describe("Post body (HTML)"),
                FieldSpec::array("labels", FieldKind::String)
                    .describe("Labels (tags) for the post")
                    .optional(),
                FieldSpec::boolean("isDraft")
                    .describe("Save as draft instead of publishing (default: true)")
                    .optional(),
            ]
        };

        let mut update_fields = vec![FieldSpec::string("postId").describe("Id of the post")];
        update_fields.extend(post_fields().into_iter().filter(|f| f.name != "isDraft"));

        Ok(vec![
            ToolDefinition::builder("blog-post")
                .description("Create a post on the configured blog. Posts are saved as drafts unless isDraft is false.")
                .schema(InputSchema::new(post_fields()))
                .service(SERVICE)
                .handler(self.tool(|this, args| async move { this.create_post(args).await }))
                .build()?,
            ToolDefinition::builder("blog-batch-post")
                .description("Create several posts one after another. A failing post does not stop the rest.")
                .schema(InputSchema::new(vec![FieldSpec::array(
                    "posts",
                    FieldKind::Object(post_fields()),
                )
                .describe("Posts to create")]))
                .service(SERVICE)
                .handler(self.tool(|this, args| async move { this.batch_post(args).await }))
                .build()?,
            ToolDefinition::builder("blog-list-posts")
                .description("List posts of the configured blog.")
                .schema(InputSchema::new(vec![
                    FieldSpec::string("status")
                        .describe("Filter by status: draft, live or scheduled")
                        .optional(),
                    FieldSpec::integer("maxResults")
                        .describe("Maximum number of posts to return")
                        .optional(),
                    FieldSpec::array("labels", FieldKind::String)
                        .describe("Only posts carrying these labels")
                        .optional(),
                    FieldSpec::string("pageToken")
                        .describe("Continuation token from a previous call")
                        .optional(),
                ]))
                .service(SERVICE)
                .handler(self.tool(|this, args| async move { this.list_posts(args).await }))
                .build()?,
            ToolDefinition::builder("blog-update-post")
                .description("Replace the title, content and labels of an existing post.")
                .schema(InputSchema::new(update_fields))
                .service(SERVICE)
                .handler(self.tool(|this, args| async move { this.update_post(args).await }))
                .build()?,
            ToolDefinition::builder("blog-delete-post")
                .description("Delete a post of the configured blog.")
                .schema(InputSchema::new(vec![
                    FieldSpec::string("postId").describe("Id of the post to delete")
                ]))
                .service(SERVICE)
                .handler(self.tool(|this, args| async move { this.delete_post(args).await }))
                .build()?,
        ])
    }

    fn tool<F, Fut>(self: &Arc<Self>, f: F) -> Arc<dyn blogspot_mcp::ToolHandler>
    where
        F: Fn(Arc<Self>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<ToolCallResult>> + Send + 'static,
    {
        let this = self.clone();
        tool_handler(move |args, _ctx| f(this.clone(), args))
    }
}

fn posted(headline: &str, post: &PostResponse, request: &BlogPost) -> String {
    format!(
        "{}\nURL: {}\nTitle: {}",
        headline,
        post.url.as_deref().unwrap_or("(not available)"),
        post.title.as_deref().unwrap_or(&request.title)
    )
}

fn draft_prompt() -> PromptDefinition {
    PromptDefinition::new(
        "blog-post-draft",
        prompt_handler(|args, _ctx| async move {
            let topic = args["topic"].as_str().unwrap_or_default();
            let tone = args["tone"].as_str().unwrap_or("informative and friendly");

            let mut text = format!(
                "Write a blog post about \"{}\".\n\n\
                 Tone: {}\n\
                 Start with a suggested title on its own line, then the body as HTML \
                 suitable for Blogger (<h2>, <p>, <ul>, <a>; no <html> or <body> wrapper).",
                topic, tone
            );
            if let Some(labels) = args["labels"].as_str().filter(|l| !l.trim().is_empty()) {
                let _ = write!(text, "\nLabels to use: {}", labels);
            }
            text.push_str(
                "\n\nWhen the draft is ready, save it with the blog-post tool (it stays a draft unless isDraft is false).",
            );
            Ok(vec![PromptMessage::user(text)])
        }),
    )
    .with_description("Draft an HTML blog post on a topic, ready for blog-post")
    .with_argument(PromptArgument::required("topic").describe("What the post is about"))
    .with_argument(
        PromptArgument::optional("tone")
            .describe("Writing tone, e.g. casual or technical")
            .of_kind(ArgumentKind::String),
    )
    .with_argument(
        PromptArgument::optional("labels")
            .describe("Comma-separated labels to suggest")
            .of_kind(ArgumentKind::String),
    )
    .with_service(SERVICE)
}
