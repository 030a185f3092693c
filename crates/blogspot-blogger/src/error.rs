//! Blogger error types.

use blogspot_auth::AuthError;
use thiserror::Error;

/// Result type for Blogger operations.
pub type BloggerResult<T> = Result<T, BloggerError>;

/// Errors that can occur talking to the Blogger API.
#[derive(Debug, Error)]
pub enum BloggerError {
    /// The API answered with a non-success status.
    #[error("Blogger API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request failed.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No access token is loaded in the session.
    #[error("Not authenticated: no access token loaded")]
    NotAuthenticated,

    /// The URL lookup returned a blog without an id.
    #[error("No blog id found for URL: {0}")]
    BlogNotFound(String),
}

impl BloggerError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Rate limits, server errors and transport failures are transient;
    /// everything else fails the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
