//! Token set and expiry classification.

use serde::{Deserialize, Serialize};

/// Tokens are refreshed this long before they actually expire.
pub const REFRESH_WINDOW_MS: i64 = 5 * 60 * 1000;

/// OAuth tokens as persisted in the token file.
///
/// Field names follow Google's token JSON so files written by other tools
/// load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expiry_date: i64) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    /// A token set without an access token counts as absent.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry_date.is_some_and(|expiry| now_ms >= expiry)
    }

    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        self.expiry_date
            .is_some_and(|expiry| now_ms >= expiry - REFRESH_WINDOW_MS)
    }
}

/// Where a stored token set stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    NeedsRefresh,
    Expired,
    /// Nothing usable; the interactive flow must run.
    Missing,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Valid => "valid",
            TokenStatus::NeedsRefresh => "needs_refresh",
            TokenStatus::Expired => "expired",
            TokenStatus::Missing => "missing",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a token set at `now_ms`.
pub fn classify(tokens: Option<&TokenSet>, now_ms: i64) -> TokenStatus {
    let Some(tokens) = tokens.filter(|t| t.has_access_token()) else {
        return TokenStatus::Missing;
    };

    if tokens.is_expired(now_ms) {
        if tokens.has_refresh_token() {
            TokenStatus::Expired
        } else {
            TokenStatus::Missing
        }
    } else if tokens.needs_refresh(now_ms) {
        TokenStatus::NeedsRefresh
    } else {
        TokenStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60 * 1000;

    #[test]
    fn test_classify_expired_with_refresh_token() {
        let tokens = TokenSet::new("at")
            .with_refresh_token("rt")
            .with_expiry(NOW - 1);
        assert_eq!(classify(Some(&tokens), NOW), TokenStatus::Expired);
    }

    #[test]
    fn test_classify_expired_without_refresh_token_is_missing() {
        let tokens = TokenSet::new("at").with_expiry(NOW - 1);
        assert_eq!(classify(Some(&tokens), NOW), TokenStatus::Missing);
    }

    #[test]
    fn test_classify_inside_refresh_window() {
        let tokens = TokenSet::new("at")
            .with_refresh_token("rt")
            .with_expiry(NOW + 4 * MINUTE);
        assert_eq!(classify(Some(&tokens), NOW), TokenStatus::NeedsRefresh);
    }

    #[test]
    fn test_classify_valid() {
        let tokens = TokenSet::new("at").with_expiry(NOW + 60 * MINUTE);
        assert_eq!(classify(Some(&tokens), NOW), TokenStatus::Valid);
    }

    #[test]
    fn test_classify_absent_and_empty() {
        assert_eq!(classify(None, NOW), TokenStatus::Missing);

        let empty = TokenSet::default()
            .with_refresh_token("rt")
            .with_expiry(NOW + 60 * MINUTE);
        assert_eq!(classify(Some(&empty), NOW), TokenStatus::Missing);
    }

    #[test]
    fn test_classify_without_expiry_is_valid() {
        assert_eq!(classify(Some(&TokenSet::new("at")), NOW), TokenStatus::Valid);
    }

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let tokens = TokenSet::new("at").with_refresh_token("rt").with_expiry(NOW);
        assert!(tokens.is_expired(NOW));
        assert!(!tokens.is_expired(NOW - 1));
    }

    #[test]
    fn test_deserialize_google_token_file() {
        let json = r#"{
            "access_token": "ya29.a0",
            "refresh_token": "1//0g",
            "scope": "https://www.googleapis.com/auth/blogger",
            "token_type": "Bearer",
            "expiry_date": 1700000000000
        }"#;
        let tokens: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "ya29.a0");
        assert_eq!(tokens.expiry_date, Some(NOW));
        assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TokenStatus::NeedsRefresh.to_string(), "needs_refresh");
    }
}
