//! Blogger v3 REST client.

use crate::error::{BloggerError, BloggerResult};
use crate::types::{BlogInfo, BlogList, BlogPost, PostList, PostListOptions, PostResponse};
use async_trait::async_trait;
use blogspot_auth::AuthSession;
use blogspot_util::TimingGuard;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default Blogger API base URL.
pub const BLOGGER_API_BASE: &str = "https://www.googleapis.com/blogger/v3";

/// Remote blog operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BloggerService: Send + Sync {
    /// Blogs the authenticated user can access.
    async fn list_blogs(&self) -> BloggerResult<Vec<BlogInfo>>;

    async fn get_blog(&self, blog_id: &str) -> BloggerResult<BlogInfo>;

    /// Look a blog up by its public URL.
    async fn get_blog_by_url(&self, blog_url: &str) -> BloggerResult<BlogInfo>;

    async fn list_posts(&self, blog_id: &str, options: &PostListOptions)
        -> BloggerResult<PostList>;

    async fn get_post(&self, blog_id: &str, post_id: &str) -> BloggerResult<PostResponse>;

    async fn create_post(&self, blog_id: &str, post: &BlogPost) -> BloggerResult<PostResponse>;

    async fn update_post(
        &self,
        blog_id: &str,
        post_id: &str,
        post: &BlogPost,
    ) -> BloggerResult<PostResponse>;

    async fn delete_post(&self, blog_id: &str, post_id: &str) -> BloggerResult<()>;
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// [`BloggerService`] over HTTPS, authorized with the session's access token.
pub struct BloggerClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<AuthSession>,
}

impl BloggerClient {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BLOGGER_API_BASE.to_string(),
            session,
        }
    }

    /// Point the client at another API root (tests use a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    async fn request(&self, method: Method, url: String) -> BloggerResult<RequestBuilder> {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(BloggerError::NotAuthenticated)?;
        debug!(%method, %url, "Blogger request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> BloggerResult<Response> {
        let (http, request) = request.build_split();
        let request = request?;
        let _timing = TimingGuard::new(
            "blogger",
            format!("{} {}", request.method(), request.url().path()),
        );
        let response = http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) if !body.error.message.is_empty() => body.error.message,
            _ if !text.trim().is_empty() => text,
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        warn!(status = status.as_u16(), %message, "Blogger API error");
        Err(BloggerError::api(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> BloggerResult<T> {
        let response = Self::send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BloggerService for BloggerClient {
    async fn list_blogs(&self) -> BloggerResult<Vec<BlogInfo>> {
        let request = self
            .request(Method::GET, self.url(&["users", "self", "blogs"]))
            .await?;
        let list: BlogList = Self::send_json(request).await?;
        Ok(list.items)
    }

    async fn get_blog(&self, blog_id: &str) -> BloggerResult<BlogInfo> {
        let request = self
            .request(Method::GET, self.url(&["blogs", blog_id]))
            .await?;
        Self::send_json(request).await
    }

    async fn get_blog_by_url(&self, blog_url: &str) -> BloggerResult<BlogInfo> {
        let request = self
            .request(Method::GET, self.url(&["blogs", "byurl"]))
            .await?
            .query(&[("url", blog_url)]);
        Self::send_json(request).await
    }

    async fn list_posts(
        &self,
        blog_id: &str,
        options: &PostListOptions,
    ) -> BloggerResult<PostList> {
        let request = self
            .request(Method::GET, self.url(&["blogs", blog_id, "posts"]))
            .await?
            .query(&options.query());
        Self::send_json(request).await
    }

    async fn get_post(&self, blog_id: &str, post_id: &str) -> BloggerResult<PostResponse> {
        let request = self
            .request(Method::GET, self.url(&["blogs", blog_id, "posts", post_id]))
            .await?;
        Self::send_json(request).await
    }

    async fn create_post(&self, blog_id: &str, post: &BlogPost) -> BloggerResult<PostResponse> {
        let mut query = vec![("fetchBody", "true"), ("fetchImages", "true")];
        if post.is_draft {
            query.push(("isDraft", "true"));
        }

        let request = self
            .request(Method::POST, self.url(&["blogs", blog_id, "posts"]))
            .await?
            .query(&query)
            .json(&post.insert_body());
        let created: PostResponse = Self::send_json(request).await?;
        info!(
            post_id = %created.id,
            url = created.url.as_deref().unwrap_or_default(),
            draft = post.is_draft,
            "Post created"
        );
        Ok(created)
    }

    async fn update_post(
        &self,
        blog_id: &str,
        post_id: &str,
        post: &BlogPost,
    ) -> BloggerResult<PostResponse> {
        let request = self
            .request(Method::PUT, self.url(&["blogs", blog_id, "posts", post_id]))
            .await?
            .json(&post.update_body(post_id));
        let updated: PostResponse = Self::send_json(request).await?;
        info!(
            post_id = %updated.id,
            url = updated.url.as_deref().unwrap_or_default(),
            "Post updated"
        );
        Ok(updated)
    }

    async fn delete_post(&self, blog_id: &str, post_id: &str) -> BloggerResult<()> {
        let request = self
            .request(Method::DELETE, self.url(&["blogs", blog_id, "posts", post_id]))
            .await?;
        Self::send(request).await?;
        info!(post_id, "Post deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostStatus;
    use blogspot_auth::{ClientCredentials, TokenSet};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> BloggerClient {
        let session = Arc::new(AuthSession::blogger(ClientCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }));
        session.set_credentials(TokenSet::new("access-1")).await;
        BloggerClient::new(session).with_base_url(format!("{}/", server.uri()))
    }

    #[tokio::test]
    async fn test_create_post_sends_draft_flag_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/blogs/99/posts"))
            .and(header("authorization", "Bearer access-1"))
            .and(query_param("isDraft", "true"))
            .and(query_param("fetchBody", "true"))
            .and(body_partial_json(json!({"title": "Hello", "labels": ["rust"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7",
                "url": "https://x.blogspot.com/hello.html",
                "title": "Hello"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let post = BlogPost::new("Hello", "<p>hi</p>").with_labels(["rust"]);
        let created = client.create_post("99", &post).await.unwrap();
        assert_eq!(created.id, "7");
        assert_eq!(created.url.as_deref(), Some("https://x.blogspot.com/hello.html"));
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/blogs/99/posts"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "We're sorry, but you don't have permission"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_post("99", &BlogPost::new("T", "C"))
            .await
            .unwrap_err();
        match err {
            BloggerError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "We're sorry, but you don't have permission");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_blog_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/byurl"))
            .and(query_param("url", "https://x.blogspot.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "99",
                "name": "X",
                "posts": {"totalItems": 12}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let blog = client
            .get_blog_by_url("https://x.blogspot.com/")
            .await
            .unwrap();
        assert_eq!(blog.id, "99");
        assert_eq!(blog.posts.unwrap().total_items, Some(12));
    }

    #[tokio::test]
    async fn test_list_posts_passes_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/99/posts"))
            .and(query_param("status", "draft"))
            .and(query_param("maxResults", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "1", "title": "One"}, {"id": "2", "title": "Two"}],
                "nextPageToken": "tok"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let options = PostListOptions {
            status: vec![PostStatus::Draft],
            max_results: Some(2),
            ..Default::default()
        };
        let list = client.list_posts("99", &options).await.unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.next_page_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_list_blogs_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/self/blogs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "blogger#blogList"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.list_blogs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/blogs/99/posts/7"))
            .and(body_partial_json(json!({"id": "7", "title": "New"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7", "title": "New"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/blogs/99/posts/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let updated = client
            .update_post("99", "7", &BlogPost::new("New", "body"))
            .await
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("New"));
        client.delete_post("99", "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let session = Arc::new(AuthSession::blogger(ClientCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }));
        let client = BloggerClient::new(session).with_base_url(server.uri());
        let err = client.get_blog("99").await.unwrap_err();
        assert!(matches!(err, BloggerError::NotAuthenticated));
    }

    #[test]
    fn test_url_encodes_segments() {
        let session = Arc::new(AuthSession::blogger(ClientCredentials {
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
        }));
        let client = BloggerClient::new(session).with_base_url("http://api/");
        assert_eq!(
            client.url(&["blogs", "a b", "posts"]),
            "http://api/blogs/a%20b/posts"
        );
    }
}
