//! Blogger v3 resource shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// A blog as returned by `blogs.get` / `blogs.getByUrl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<ItemCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<ItemCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemCount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Locale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BlogList {
    #[serde(default)]
    pub items: Vec<BlogInfo>,
}

fn default_draft() -> bool {
    true
}

/// `isDraft: null` means unset, which is a draft.
fn draft_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_draft))
}

/// Treat an explicit `null` like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A post to create or update.
///
/// Deserializes from tool arguments (`title`, `content`, `labels`,
/// `isDraft`); `isDraft` defaults to `true`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub title: String,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(default = "default_draft", deserialize_with = "draft_flag")]
    pub is_draft: bool,
    /// Publish time; a future value schedules the post.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// Extra resource fields merged into update requests.
    #[serde(skip)]
    pub additional_fields: Map<String, Value>,
}

impl BlogPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            labels: Vec::new(),
            is_draft: true,
            published: None,
            additional_fields: Map::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published = Some(at);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_fields.insert(key.into(), value);
        self
    }

    /// Request body for `posts.insert`.
    pub(crate) fn insert_body(&self) -> Value {
        let mut body = json!({
            "title": self.title,
            "content": self.content,
            "labels": self.labels,
        });
        if let Some(published) = self.published {
            body["published"] = json!(published.to_rfc3339());
        }
        body
    }

    /// Request body for `posts.update`. Additional fields win over the
    /// named ones except `id`.
    pub(crate) fn update_body(&self, post_id: &str) -> Value {
        let mut body = self.insert_body();
        if let Value::Object(map) = &mut body {
            for (key, value) in &self.additional_fields {
                map.insert(key.clone(), value.clone());
            }
            map.insert("id".into(), json!(post_id));
        }
        body
    }
}

/// A post as returned by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog: Option<BlogRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_meta_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlogRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub url: String,
}

/// One page of `posts.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostList {
    #[serde(default)]
    pub items: Vec<PostResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_page_token: Option<String>,
}

/// Post status filter for `posts.list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Live,
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Live => "live",
            PostStatus::Scheduled => "scheduled",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "live" => Ok(PostStatus::Live),
            "scheduled" => Ok(PostStatus::Scheduled),
            other => Err(format!(
                "Unknown post status '{}' (expected draft, live or scheduled)",
                other
            )),
        }
    }
}

/// Access level requested from `posts.list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostView {
    Reader,
    Author,
    Admin,
}

impl PostView {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostView::Reader => "READER",
            PostView::Author => "AUTHOR",
            PostView::Admin => "ADMIN",
        }
    }
}

/// Query options for `posts.list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostListOptions {
    pub view: Option<PostView>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
    pub status: Vec<PostStatus>,
    pub fetch_bodies: Option<bool>,
    pub fetch_images: Option<bool>,
}

impl PostListOptions {
    /// Query pairs in API parameter names. `status` repeats per value.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(view) = self.view {
            query.push(("view", view.as_str().to_string()));
        }
        if let Some(start) = self.start_date {
            query.push(("startDate", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            query.push(("endDate", end.to_rfc3339()));
        }
        if !self.labels.is_empty() {
            query.push(("labels", self.labels.join(",")));
        }
        if let Some(max) = self.max_results {
            query.push(("maxResults", max.to_string()));
        }
        if let Some(ref token) = self.page_token {
            query.push(("pageToken", token.clone()));
        }
        for status in &self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(fetch) = self.fetch_bodies {
            query.push(("fetchBodies", fetch.to_string()));
        }
        if let Some(fetch) = self.fetch_images {
            query.push(("fetchImages", fetch.to_string()));
        }
        query
    }
}

/// Outcome of one post in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchPostResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchPostResult {
    pub fn succeeded(title: impl Into<String>, post: &PostResponse) -> Self {
        Self {
            success: true,
            post_id: Some(post.id.clone()),
            url: post.url.clone(),
            title: title.into(),
            error: None,
        }
    }

    pub fn failed(title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            post_id: None,
            url: None,
            title: title.into(),
            error: Some(error.into()),
        }
    }
}
