//! Single-slot token persistence.

use crate::error::{AuthError, AuthResult};
use crate::token::{classify, TokenSet, TokenStatus};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Token file name, resolved against the working directory.
pub const TOKEN_FILE_NAME: &str = ".blogger-tokens.json";

/// Persists one [`TokenSet`] as a JSON file.
///
/// Every save overwrites the whole file. There is no locking: the last
/// writer wins, so only one process should own a given token file.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `.blogger-tokens.json` in the current directory.
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(TOKEN_FILE_NAME))
    }

    /// Create a store with a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the token file with `tokens`.
    ///
    /// Failures are logged and returned.
    pub async fn save(&self, tokens: &TokenSet) -> AuthResult<()> {
        let result = self.write(tokens).await;
        match &result {
            Ok(()) => debug!(path = ?self.path, "Saved tokens"),
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to save tokens"),
        }
        result
    }

    async fn write(&self, tokens: &TokenSet) -> AuthResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(tokens)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await?;

        // `mode` only applies on creation; tighten an existing file before
        // any token bytes land in it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| {
                    AuthError::Permissions(format!(
                        "Failed to set permissions on {:?}: {}",
                        self.path, e
                    ))
                })?;
        }

        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read the token file.
    ///
    /// A missing, unreadable or malformed file is reported as `None`.
    pub async fn load(&self) -> Option<TokenSet> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No token file");
                return None;
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read token file");
                return None;
            }
        };

        match serde_json::from_str::<TokenSet>(&content) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring malformed token file");
                None
            }
        }
    }

    /// Delete the token file. Succeeds when it is already gone.
    pub async fn clear(&self) -> AuthResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = ?self.path, "Removed token file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to remove token file");
                Err(e.into())
            }
        }
    }

    /// Classify whatever is currently stored.
    pub async fn status(&self, now_ms: i64) -> TokenStatus {
        classify(self.load().await.as_ref(), now_ms)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .finish()
    }
}
