//! Composite operations built on [`BloggerService`].

use crate::client::BloggerService;
use crate::error::BloggerResult;
use crate::types::{BatchPostResult, BlogPost, PostResponse};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between successive creates in a batch.
pub const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Attempts made by [`retry_with_backoff`] with the default policy.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles on every further attempt.
pub const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Create a post as a draft regardless of its flag.
pub async fn save_draft(
    service: &dyn BloggerService,
    blog_id: &str,
    post: BlogPost,
) -> BloggerResult<PostResponse> {
    service.create_post(blog_id, &post.draft(true)).await
}

/// Create a post that goes live at `publish_at`.
pub async fn schedule_post(
    service: &dyn BloggerService,
    blog_id: &str,
    post: BlogPost,
    publish_at: DateTime<Utc>,
) -> BloggerResult<PostResponse> {
    service
        .create_post(blog_id, &post.published_at(publish_at))
        .await
}

/// Create posts one after another.
///
/// A failing post is recorded and the batch moves on. `delay` is waited
/// between successive create calls, not after the last one.
pub async fn batch_create_posts(
    service: &dyn BloggerService,
    blog_id: &str,
    posts: &[BlogPost],
    delay: Duration,
) -> Vec<BatchPostResult> {
    let mut results = Vec::with_capacity(posts.len());

    for (index, post) in posts.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match service.create_post(blog_id, post).await {
            Ok(created) => results.push(BatchPostResult::succeeded(&post.title, &created)),
            Err(e) => {
                warn!(index, title = %post.title, error = %e, "Batch post failed");
                results.push(BatchPostResult::failed(&post.title, e.to_string()));
            }
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    info!(
        total = results.len(),
        succeeded = results.len() - failed,
        failed,
        "Batch posting finished"
    );
    results
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. Waits `initial_delay * 2^n` between attempts.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    initial_delay: Duration,
    mut op: F,
) -> BloggerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BloggerResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && e.is_retryable() => {
                let delay = initial_delay * 2u32.saturating_pow(attempt);
                info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Blogger call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockBloggerService;
    use crate::error::BloggerError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn created(id: &str) -> PostResponse {
        PostResponse {
            id: id.to_string(),
            url: Some(format!("https://x.blogspot.com/{id}.html")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let mut service = MockBloggerService::new();
        service
            .expect_create_post()
            .times(3)
            .returning(|_, post| {
                if post.title == "B" {
                    Err(BloggerError::api(500, "backend error"))
                } else {
                    Ok(created(&post.title.to_lowercase()))
                }
            });

        let posts = vec![
            BlogPost::new("A", "a"),
            BlogPost::new("B", "b"),
            BlogPost::new("C", "c"),
        ];
        let results = batch_create_posts(&service, "99", &posts, Duration::ZERO).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert_eq!(results[0].post_id.as_deref(), Some("a"));
        assert!(!results[1].success);
        assert_eq!(results[1].title, "B");
        assert_eq!(
            results[1].error.as_deref(),
            Some("Blogger API error (500): backend error")
        );
        assert!(results[2].success);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_waits_between_posts_only() {
        let mut service = MockBloggerService::new();
        service
            .expect_create_post()
            .returning(|_, post| Ok(created(&post.title)));

        let posts = vec![BlogPost::new("A", "a"), BlogPost::new("B", "b")];
        let started = tokio::time::Instant::now();
        batch_create_posts(&service, "99", &posts, BATCH_DELAY).await;
        assert_eq!(started.elapsed(), BATCH_DELAY);
    }

    #[tokio::test]
    async fn test_save_draft_forces_draft() {
        let mut service = MockBloggerService::new();
        service
            .expect_create_post()
            .withf(|blog_id, post| blog_id.to_string() == "99" && post.is_draft)
            .times(1)
            .returning(|_, _| Ok(created("1")));

        let post = BlogPost::new("T", "C").draft(false);
        save_draft(&service, "99", post).await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_post_sets_publish_time() {
        let at = Utc::now() + chrono::Duration::days(1);
        let mut service = MockBloggerService::new();
        service
            .expect_create_post()
            .withf(move |blog_id, post| blog_id.to_string() == "99" && post.published == Some(at))
            .times(1)
            .returning(|_, _| Ok(created("1")));

        schedule_post(&service, "99", BlogPost::new("T", "C"), at)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(RETRY_MAX_ATTEMPTS, RETRY_INITIAL_DELAY, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BloggerError::api(503, "unavailable"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: BloggerResult<()> =
            retry_with_backoff(RETRY_MAX_ATTEMPTS, RETRY_INITIAL_DELAY, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BloggerError::api(429, "quota")) }
            })
            .await;

        assert!(matches!(result, Err(BloggerError::Api { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: BloggerResult<()> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BloggerError::api(404, "not found")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
