//! ULID-based identifier generation with prefixes.
//!
//! Identifiers follow the pattern `prefix_ulid`, e.g. `req_01hqxyz...` for
//! a registry execution request.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    /// An execution request flowing through a registry.
    Request,
    /// One interactive authorization attempt.
    AuthAttempt,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Request => "req",
            IdPrefix::AuthAttempt => "auth",
        }
    }

    /// Parse a prefix from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "req" => Some(IdPrefix::Request),
            "auth" => Some(IdPrefix::AuthAttempt),
            _ => None,
        }
    }
}

/// Identifier generation and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        format!("{}_{}", prefix.as_str(), Ulid::new().to_string().to_lowercase())
    }

    /// Parse an identifier into its prefix and ULID parts.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let (prefix, ulid) = id.split_once('_')?;
        let prefix = IdPrefix::parse(prefix)?;
        let ulid = Ulid::from_string(ulid).ok()?;
        Some((prefix, ulid))
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Generate a request ID for a registry execution.
    pub fn request() -> String {
        Self::ascending(IdPrefix::Request)
    }

    /// Generate an ID for an interactive authorization attempt.
    pub fn auth_attempt() -> String {
        Self::ascending(IdPrefix::AuthAttempt)
    }
}
