//! Blog URL to blog id resolution.

use crate::client::BloggerService;
use crate::error::{BloggerError, BloggerResult};
use crate::ops::{retry_with_backoff, RETRY_INITIAL_DELAY, RETRY_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cache file name, resolved against the working directory.
pub const BLOG_ID_CACHE_FILE: &str = ".blog_id_cache.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    blog_url: String,
    blog_id: String,
}

/// Remembers the id of the configured blog so startup skips the lookup.
///
/// The entry is only used when its URL matches the configured one.
pub struct BlogIdCache {
    path: PathBuf,
}

impl BlogIdCache {
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(BLOG_ID_CACHE_FILE))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached id for `blog_url`, if any.
    pub async fn load(&self, blog_url: &str) -> Option<String> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.blog_url == blog_url => Some(entry.blog_id),
            Ok(entry) => {
                debug!(cached = %entry.blog_url, configured = %blog_url, "Blog id cache is for another URL");
                None
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring malformed blog id cache");
                None
            }
        }
    }

    pub async fn save(&self, blog_url: &str, blog_id: &str) -> BloggerResult<()> {
        let entry = CacheEntry {
            blog_url: blog_url.to_string(),
            blog_id: blog_id.to_string(),
        };
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&entry)?).await?;
        debug!(path = ?self.path, "Saved blog id cache");
        Ok(())
    }
}

impl Default for BlogIdCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Determine the blog id to operate on.
///
/// A fixed id wins. Otherwise the cache is consulted, then the API is asked
/// by URL and the answer cached. A failed cache write is only logged.
pub async fn resolve_blog_id(
    service: &dyn BloggerService,
    cache: &BlogIdCache,
    fixed_id: Option<&str>,
    blog_url: &str,
) -> BloggerResult<String> {
    if let Some(id) = fixed_id.filter(|id| !id.is_empty()) {
        debug!(blog_id = %id, "Using configured blog id");
        return Ok(id.to_string());
    }

    if let Some(id) = cache.load(blog_url).await {
        debug!(blog_id = %id, "Using cached blog id");
        return Ok(id);
    }

    let blog = retry_with_backoff(RETRY_MAX_ATTEMPTS, RETRY_INITIAL_DELAY, || {
        service.get_blog_by_url(blog_url)
    })
    .await?;
    if blog.id.is_empty() {
        return Err(BloggerError::BlogNotFound(blog_url.to_string()));
    }

    info!(blog_id = %blog.id, blog_url, "Resolved blog id");
    if let Err(e) = cache.save(blog_url, &blog.id).await {
        warn!(error = %e, "Failed to write blog id cache");
    }
    Ok(blog.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockBloggerService;
    use crate::types::BlogInfo;
    use tempfile::TempDir;

    const URL: &str = "https://x.blogspot.com/";

    fn cache_in(dir: &TempDir) -> BlogIdCache {
        BlogIdCache::with_path(dir.path().join(BLOG_ID_CACHE_FILE))
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_url_mismatch() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert_eq!(cache.load(URL).await, None);
        cache.save(URL, "99").await.unwrap();
        assert_eq!(cache.load(URL).await.as_deref(), Some("99"));
        assert_eq!(cache.load("https://other.blogspot.com/").await, None);

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        assert!(raw.contains("\"blogUrl\""));
        assert!(raw.contains("\"blogId\""));
    }

    #[tokio::test]
    async fn test_malformed_cache_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        std::fs::write(cache.path(), "{not json").unwrap();
        assert_eq!(cache.load(URL).await, None);
    }

    #[tokio::test]
    async fn test_fixed_id_skips_lookup() {
        let dir = TempDir::new().unwrap();
        let mut service = MockBloggerService::new();
        service.expect_get_blog_by_url().times(0);

        let id = resolve_blog_id(&service, &cache_in(&dir), Some("42"), URL)
            .await
            .unwrap();
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn test_lookup_populates_cache() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let mut service = MockBloggerService::new();
        service.expect_get_blog_by_url().times(1).returning(|_| {
            Ok(BlogInfo {
                id: "99".to_string(),
                ..Default::default()
            })
        });

        assert_eq!(resolve_blog_id(&service, &cache, None, URL).await.unwrap(), "99");
        // Second resolution is served from the cache.
        assert_eq!(resolve_blog_id(&service, &cache, None, URL).await.unwrap(), "99");
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let mut service = MockBloggerService::new();
        service
            .expect_get_blog_by_url()
            .times(1)
            .returning(|_| Err(BloggerError::api(404, "Blog not found")));

        let err = resolve_blog_id(&service, &cache_in(&dir), None, URL)
            .await
            .unwrap_err();
        assert!(matches!(err, BloggerError::Api { status: 404, .. }));
        assert!(!cache_in(&dir).path().exists());
    }
}
