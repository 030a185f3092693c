//! Blogger v3 integration.
//!
//! - [`BloggerService`]: the remote blog operations, implemented over HTTPS
//!   by [`BloggerClient`]
//! - [`ops`]: drafts, scheduled posts, sequential batches and retry
//! - [`BlogIdCache`] / [`resolve_blog_id`]: blog URL to id resolution
//! - [`BloggerTools`]: the MCP tools, resource and prompt built on top

pub mod cache;
pub mod client;
pub mod error;
pub mod ops;
pub mod tools;
pub mod types;

pub use cache::{resolve_blog_id, BlogIdCache, BLOG_ID_CACHE_FILE};
pub use client::{BloggerClient, BloggerService, BLOGGER_API_BASE};
pub use error::{BloggerError, BloggerResult};
pub use ops::{batch_create_posts, retry_with_backoff, save_draft, schedule_post};
pub use tools::{BloggerTools, SERVICE};
pub use types::{
    BatchPostResult, BlogInfo, BlogPost, PostList, PostListOptions, PostResponse, PostStatus,
    PostView,
};
