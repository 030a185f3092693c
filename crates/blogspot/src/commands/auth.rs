//! Authentication command handlers.
//!
//! Handles login, logout and status for the stored Blogger credential.

use crate::config::OAuthClient;
use blogspot_auth::{
    classify, current_time_ms, AuthSession, AuthorizationFlow, CredentialStore, TokenStatus,
};
use clap::Subcommand;
use std::sync::Arc;
use tracing::{info, warn};

/// Authentication subcommands.
#[derive(Subcommand)]
pub enum AuthCommands {
    /// Authorize Blogger access in the browser and store the tokens
    Login,
    /// Remove the stored tokens
    Logout,
    /// Show the state of the stored tokens
    Status,
}

/// Handle authentication commands.
pub async fn handle_auth(command: AuthCommands) -> anyhow::Result<()> {
    let store = Arc::new(CredentialStore::new());
    match command {
        AuthCommands::Login => {
            let oauth = OAuthClient::from_env()?;
            let session = Arc::new(session_for(&oauth));
            AuthorizationFlow::new(session, store.clone())
                .with_fixed_redirect(oauth.redirect_uri)
                .run()
                .await?;
            println!("Authenticated. Tokens saved to {}", store.path().display());
        }
        AuthCommands::Logout => {
            store.clear().await?;
            println!("Logged out. Removed {}", store.path().display());
        }
        AuthCommands::Status => auth_status(&store).await,
    }

    Ok(())
}

async fn auth_status(store: &CredentialStore) {
    let tokens = store.load().await;
    let status = classify(tokens.as_ref(), current_time_ms());

    println!("Token file: {}", store.path().display());
    println!("Status:     {}", status);
    if let Some(expiry) = tokens.as_ref().and_then(|t| t.expiry_date) {
        let remaining_secs = (expiry - current_time_ms()) / 1000;
        if remaining_secs > 0 {
            println!("Expires in: {}m {}s", remaining_secs / 60, remaining_secs % 60);
        } else {
            println!("Expired:    {}m ago", -remaining_secs / 60);
        }
    }
    if status == TokenStatus::Missing {
        println!();
        println!("Run `blogspot auth login` to authenticate.");
    }
}

pub fn session_for(oauth: &OAuthClient) -> AuthSession {
    AuthSession::blogger(oauth.credentials.clone()).with_endpoints(oauth.endpoints.clone())
}

/// Make sure the session holds a usable token before serving.
///
/// Missing credentials start the interactive flow. Stale ones are
/// refreshed, and a failed refresh falls back to the interactive flow.
pub async fn ensure_credentials(
    session: Arc<AuthSession>,
    store: Arc<CredentialStore>,
    redirect_uri: Option<String>,
) -> anyhow::Result<()> {
    let flow = || {
        AuthorizationFlow::new(session.clone(), store.clone())
            .with_fixed_redirect(redirect_uri.clone())
    };

    let Some(tokens) = store.load().await else {
        info!("No stored credential, starting interactive authorization");
        flow().run().await?;
        return Ok(());
    };

    let status = classify(Some(&tokens), current_time_ms());
    session.set_credentials(tokens).await;
    match status {
        TokenStatus::Valid => {
            info!("Stored credential is valid");
        }
        TokenStatus::NeedsRefresh | TokenStatus::Expired => match session.refresh().await {
            Ok(refreshed) => store.save(&refreshed).await?,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, starting interactive authorization");
                flow().run().await?;
            }
        },
        TokenStatus::Missing => {
            info!("Stored credential is unusable, starting interactive authorization");
            flow().run().await?;
        }
    }
    Ok(())
}
