//! Error types for the credential lifecycle.

use thiserror::Error;

/// Errors that can occur while acquiring, refreshing or persisting tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Failed to read or write the token file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize token data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to the identity provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity provider rejected the request.
    #[error("Token endpoint rejected the request: {error}{}", describe(.description))]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// The stored grant can no longer be used; the interactive flow must run again.
    #[error("Re-authentication required: {0}")]
    ReauthRequired(String),

    /// The user declined consent or the callback carried no code.
    #[error("Authorization denied: {0}")]
    Denied(String),

    /// The callback `state` did not match the one sent with the authorization URL.
    #[error("OAuth state mismatch - possible CSRF attempt")]
    StateMismatch,

    /// An authorization URL or code exchange was requested before a redirect URI was bound.
    #[error("Redirect URI has not been set for this authorization attempt")]
    MissingRedirectUri,

    /// Could not bind or serve the local callback listener.
    #[error("Callback listener failed: {0}")]
    Listener(String),

    /// Failed to set file permissions.
    #[error("Failed to set file permissions: {0}")]
    Permissions(String),
}

impl AuthError {
    /// Whether the error means the refresh token is unusable.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::ReauthRequired(_))
    }
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                AuthError::Provider {
                    error: "invalid_grant".to_string(),
                    description: Some("Bad Request".to_string()),
                },
                "Token endpoint rejected the request: invalid_grant (Bad Request)",
            ),
            (
                AuthError::Provider {
                    error: "invalid_client".to_string(),
                    description: None,
                },
                "Token endpoint rejected the request: invalid_client",
            ),
            (
                AuthError::ReauthRequired("token revoked".to_string()),
                "Re-authentication required: token revoked",
            ),
            (
                AuthError::Denied("access_denied".to_string()),
                "Authorization denied: access_denied",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_requires_reauth() {
        assert!(AuthError::ReauthRequired("x".into()).requires_reauth());
        assert!(!AuthError::StateMismatch.requires_reauth());
    }
}
