//! Environment configuration.

use blogspot_auth::{ClientCredentials, GoogleEndpoints};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CLIENT_SECRET_PATH: &str = "GOOGLE_CLIENT_SECRET_PATH";
pub const ENV_BLOG_URL: &str = "BLOG_URL";
pub const ENV_BLOG_ID: &str = "BLOG_ID";
pub const ENV_PORT: &str = "PORT";
pub const ENV_SESSION_SECRET: &str = "SESSION_SECRET";
pub const ENV_REDIRECT_URI: &str = "REDIRECT_URI";

/// Port of the HTTP transport when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Cannot read client secret file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed client secret file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Client secret file {} has neither a \"web\" nor an \"installed\" section", .0.display())]
    NoClientSection(PathBuf),

    #[error("Invalid PORT value '{0}'")]
    InvalidPort(String),
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    web: Option<ClientSection>,
    installed: Option<ClientSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// OAuth client registration read from the Google client secret JSON.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub credentials: ClientCredentials,
    pub endpoints: GoogleEndpoints,
    /// Fixed redirect URI (`REDIRECT_URI`).
    pub redirect_uri: Option<String>,
}

impl OAuthClient {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup(ENV_CLIENT_SECRET_PATH)
            .ok_or(ConfigError::Missing(ENV_CLIENT_SECRET_PATH))?;
        let mut client = Self::from_file(Path::new(&path))?;
        client.redirect_uri = lookup(ENV_REDIRECT_URI);
        Ok(client)
    }

    /// Parse a client secret file. `web` wins over `installed`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ClientSecretFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let section = file
            .web
            .or(file.installed)
            .ok_or_else(|| ConfigError::NoClientSection(path.to_path_buf()))?;

        let mut endpoints = GoogleEndpoints::default();
        if let Some(auth_uri) = section.auth_uri {
            endpoints.auth_url = auth_uri;
        }
        if let Some(token_uri) = section.token_uri {
            endpoints.token_url = token_uri;
        }

        Ok(Self {
            credentials: ClientCredentials {
                client_id: section.client_id,
                client_secret: section.client_secret,
            },
            endpoints,
            redirect_uri: None,
        })
    }
}

/// Everything `serve` needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthClient,
    pub blog_url: String,
    pub blog_id: Option<String>,
    pub port: u16,
    /// API key required by the HTTP transport.
    pub session_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let blog_url = lookup(ENV_BLOG_URL).ok_or(ConfigError::Missing(ENV_BLOG_URL))?;
        let oauth = OAuthClient::from_lookup(lookup)?;

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            oauth,
            blog_url,
            blog_id: lookup(ENV_BLOG_ID),
            port,
            session_secret: lookup(ENV_SESSION_SECRET),
        })
    }
}

/// Environment lookup that treats empty values as unset.
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
