//! Google OAuth credential lifecycle for the blogspot MCP server.
//!
//! # Components
//!
//! - [`TokenSet`] and [`classify`]: the persisted token shape and its
//!   `valid` / `needs_refresh` / `expired` / `missing` classification
//! - [`CredentialStore`]: the single token file (`.blogger-tokens.json`)
//! - [`AuthSession`]: authorization URL, code exchange, refresh, validity checks
//! - [`AuthorizationFlow`]: the interactive browser flow over a loopback listener
//!
//! # Example
//!
//! ```no_run
//! use blogspot_auth::{AuthSession, AuthorizationFlow, ClientCredentials, CredentialStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), blogspot_auth::AuthError> {
//! let session = Arc::new(AuthSession::blogger(ClientCredentials {
//!     client_id: "id.apps.googleusercontent.com".to_string(),
//!     client_secret: "secret".to_string(),
//! }));
//! let store = Arc::new(CredentialStore::new());
//!
//! match store.load().await {
//!     Some(tokens) => session.set_credentials(tokens).await,
//!     None => {
//!         AuthorizationFlow::new(session.clone(), store.clone()).run().await?;
//!     }
//! }
//!
//! if let Some(refreshed) = session.ensure_valid().await? {
//!     store.save(&refreshed).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod callback;
mod error;
mod session;
mod store;
mod token;

pub use callback::{AuthorizationFlow, BrowserOpener, CallbackListener, SystemBrowser, CALLBACK_PATH};
pub use error::{AuthError, AuthResult};
pub use session::{AuthSession, AuthorizationRequest, ClientCredentials, GoogleEndpoints, BLOGGER_SCOPE};
pub use store::{CredentialStore, TOKEN_FILE_NAME};
pub use token::{classify, TokenSet, TokenStatus, REFRESH_WINDOW_MS};

/// Get the current time in milliseconds since Unix epoch.
pub fn current_time_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
