//! Issued token types.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Access token issued through the implicit grant, with metadata.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Token type as reported by the provider (usually "Bearer").
    pub token_type: Option<String>,
    /// When the access token expires. `None` means expiry is not tracked locally.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes. `None` means the token is unscoped and satisfies any request.
    pub scopes: Option<Vec<String>>,
    /// Response fields this crate does not interpret, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

impl IssuedToken {
    /// Create an unscoped token that never expires locally.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            token_type: None,
            expires_at: None,
            scopes: None,
            extra: BTreeMap::new(),
        }
    }

    /// Check if the access token had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires| expires <= now)
            .unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get the remaining time until expiration.
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        self.expires_at.map(|expires| expires - Utc::now())
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes
            .as_ref()
            .map(|scopes| scopes.iter().any(|s| s == scope))
            .unwrap_or(false)
    }

    /// True if every requested scope was granted, or if the token is unscoped.
    pub fn covers(&self, requested: &[String]) -> bool {
        match &self.scopes {
            None => true,
            Some(granted) => requested.iter().all(|scope| granted.contains(scope)),
        }
    }

    /// True if both tokens were granted the same set of scopes.
    pub fn same_scope_set(&self, other: &IssuedToken) -> bool {
        fn as_set(scopes: &Option<Vec<String>>) -> Option<BTreeSet<&str>> {
            scopes
                .as_ref()
                .map(|scopes| scopes.iter().map(String::as_str).collect())
        }
        as_set(&self.scopes) == as_set(&other.scopes)
    }

    /// Convert into the plain record written to storage.
    pub fn into_stored(self) -> StoredToken {
        StoredToken {
            access_token: self.access_token.expose_secret().clone(),
            token_type: self.token_type,
            expires: self.expires_at.map(|at| at.timestamp()),
            scopes: self.scopes,
            extra: self.extra,
        }
    }
}

/// Serializable form of [`IssuedToken`] with the secret exposed.
///
/// Only used at the storage boundary; `expires` is epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl From<StoredToken> for IssuedToken {
    fn from(stored: StoredToken) -> Self {
        Self {
            access_token: SecretString::new(stored.access_token),
            token_type: stored.token_type,
            expires_at: stored
                .expires
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            scopes: stored.scopes,
            extra: stored.extra,
        }
    }
}
