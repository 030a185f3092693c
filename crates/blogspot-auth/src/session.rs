//! Authorization-code exchange and refresh against Google's OAuth endpoints.

use crate::error::{AuthError, AuthResult};
use crate::token::{classify, TokenSet, TokenStatus};
use crate::current_time_ms;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// OAuth scope for managing Blogger content.
pub const BLOGGER_SCOPE: &str = "https://www.googleapis.com/auth/blogger";

/// Google OAuth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    /// Used to probe tokens whose expiry is unknown.
    pub tokeninfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints under one base URL (`/auth`, `/token`, `/tokeninfo`).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/auth"),
            token_url: format!("{base}/token"),
            tokeninfo_url: format!("{base}/tokeninfo"),
        }
    }
}

/// OAuth client registration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A consent-screen URL plus the `state` the callback must echo.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token_set(self, now_ms: i64) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry_date: self.expires_in.map(|secs| now_ms + secs * 1000),
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}

/// Token endpoint error body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Default)]
struct SessionState {
    /// Rebound before every interactive attempt.
    redirect_uri: Option<String>,
    credentials: Option<TokenSet>,
    /// PKCE verifier of the authorization URL currently handed out.
    code_verifier: Option<String>,
}

/// Drives the OAuth authorization-code and refresh grants.
pub struct AuthSession {
    client: ClientCredentials,
    scopes: Vec<String>,
    endpoints: GoogleEndpoints,
    http: reqwest::Client,
    state: RwLock<SessionState>,
}

impl AuthSession {
    pub fn new(client: ClientCredentials, scopes: Vec<String>) -> Self {
        Self {
            client,
            scopes,
            endpoints: GoogleEndpoints::default(),
            http: reqwest::Client::new(),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Session requesting only the Blogger scope.
    pub fn blogger(client: ClientCredentials) -> Self {
        Self::new(client, vec![BLOGGER_SCOPE.to_string()])
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub async fn set_redirect_uri(&self, redirect_uri: impl Into<String>) {
        self.state.write().await.redirect_uri = Some(redirect_uri.into());
    }

    pub async fn redirect_uri(&self) -> Option<String> {
        self.state.read().await.redirect_uri.clone()
    }

    pub async fn set_credentials(&self, tokens: TokenSet) {
        self.state.write().await.credentials = Some(tokens);
    }

    pub async fn credentials(&self) -> Option<TokenSet> {
        self.state.read().await.credentials.clone()
    }

    /// Current access token, if any. No validity check.
    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .credentials
            .as_ref()
            .filter(|t| t.has_access_token())
            .map(|t| t.access_token.clone())
    }

    /// Build the consent-screen URL for the bound redirect URI.
    ///
    /// Requests offline access and forces the consent prompt so Google
    /// issues a refresh token even on repeat authorizations.
    pub async fn build_authorization_url(&self) -> AuthResult<AuthorizationRequest> {
        let mut state = self.state.write().await;
        let redirect_uri = state
            .redirect_uri
            .clone()
            .ok_or(AuthError::MissingRedirectUri)?;

        let oauth_state = generate_state();
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);

        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}&code_challenge={}&code_challenge_method=S256",
            self.endpoints.auth_url,
            urlencoding::encode(&self.client.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
            urlencoding::encode(&oauth_state),
            urlencoding::encode(&challenge),
        );

        state.code_verifier = Some(verifier);
        debug!(redirect_uri = %redirect_uri, "Built authorization URL");

        Ok(AuthorizationRequest {
            url,
            state: oauth_state,
        })
    }

    /// Trade an authorization code for tokens and keep them in memory.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<TokenSet> {
        let (redirect_uri, verifier) = {
            let mut state = self.state.write().await;
            let redirect_uri = state
                .redirect_uri
                .clone()
                .ok_or(AuthError::MissingRedirectUri)?;
            (redirect_uri, state.code_verifier.take())
        };

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
        ];
        if let Some(verifier) = verifier.as_deref() {
            params.push(("code_verifier", verifier));
        }

        let tokens = self
            .post_token(&params)
            .await?
            .into_token_set(current_time_ms());

        if !tokens.has_refresh_token() {
            warn!("Token response carried no refresh token");
        }
        self.set_credentials(tokens.clone()).await;
        info!("Exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// A rejected refresh means the grant was revoked or expired and
    /// surfaces as [`AuthError::ReauthRequired`].
    pub async fn refresh(&self) -> AuthResult<TokenSet> {
        let previous = self.credentials().await;
        let refresh_token = previous
            .as_ref()
            .filter(|t| t.has_refresh_token())
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| AuthError::ReauthRequired("no refresh token stored".to_string()))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
        ];

        let response = match self.post_token(&params).await {
            Ok(response) => response,
            Err(AuthError::Provider { error, description }) => {
                warn!(error = %error, "Refresh token rejected");
                let reason = match description {
                    Some(d) => format!("refresh rejected ({error}: {d})"),
                    None => format!("refresh rejected ({error})"),
                };
                return Err(AuthError::ReauthRequired(reason));
            }
            Err(e) => return Err(e),
        };

        let mut tokens = response.into_token_set(current_time_ms());
        // Google usually omits the refresh token on refresh responses.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }
        if tokens.scope.is_none() {
            tokens.scope = previous.and_then(|t| t.scope);
        }

        self.set_credentials(tokens.clone()).await;
        info!("Access token refreshed");
        Ok(tokens)
    }

    /// Make sure the in-memory credentials are usable.
    ///
    /// Returns `None` when the current token is fine and the refreshed
    /// tokens when a refresh happened.
    pub async fn ensure_valid(&self) -> AuthResult<Option<TokenSet>> {
        let tokens = self
            .credentials()
            .await
            .filter(|t| t.has_access_token())
            .ok_or_else(|| AuthError::ReauthRequired("no credentials loaded".to_string()))?;

        match classify(Some(&tokens), current_time_ms()) {
            TokenStatus::Valid if tokens.expiry_date.is_some() => Ok(None),
            TokenStatus::Valid => match self.probe(&tokens.access_token).await {
                Ok(()) => Ok(None),
                Err(e) if is_invalid_grant(&e) => {
                    debug!(error = %e, "Token probe rejected, refreshing");
                    self.refresh().await.map(Some)
                }
                Err(e) => Err(e),
            },
            TokenStatus::NeedsRefresh | TokenStatus::Expired => self.refresh().await.map(Some),
            TokenStatus::Missing => Err(AuthError::ReauthRequired(
                "access token expired and no refresh token is stored".to_string(),
            )),
        }
    }

    /// Ask Google whether an access token is still accepted.
    async fn probe(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .http
            .get(&self.endpoints.tokeninfo_url)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();
            return Err(AuthError::Provider {
                error: parsed
                    .as_ref()
                    .and_then(|e| e.error.clone())
                    .unwrap_or_else(|| "invalid_token".to_string()),
                description: parsed.and_then(|e| e.error_description),
            });
        }

        Err(AuthError::Provider {
            error: format!("tokeninfo returned {status}"),
            description: Some(body).filter(|b| !b.is_empty()),
        })
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();
            return Err(AuthError::Provider {
                error: parsed
                    .as_ref()
                    .and_then(|e| e.error.clone())
                    .unwrap_or_else(|| format!("http_{}", status.as_u16())),
                description: parsed
                    .and_then(|e| e.error_description)
                    .or_else(|| Some(body).filter(|b| !b.is_empty())),
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("client", &self.client)
            .field("scopes", &self.scopes)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn is_invalid_grant(error: &AuthError) -> bool {
    matches!(error, AuthError::Provider { error, .. } if error == "invalid_grant" || error == "invalid_token")
}

/// Generate a PKCE code verifier.
fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// S256 code challenge for a verifier.
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
