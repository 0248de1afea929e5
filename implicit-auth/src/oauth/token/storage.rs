//! Token store persisting issued tokens per provider.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{IssuedToken, StoredToken};
use crate::error::Error;
use crate::storage::KeyValueStorage;

const TOKENS_PREFIX: &str = "tokens-";

/// Store for issued tokens, one JSON array per provider.
///
/// Lookups treat expired tokens as absent; they are dropped from storage the next
/// time a token is saved for the same provider.
pub struct TokenStore<S: KeyValueStorage> {
    storage: S,
}

impl<S: KeyValueStorage> TokenStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Save a token for a provider.
    ///
    /// Replaces any token granted the same scope set, and drops expired tokens.
    pub fn save(&self, provider_id: &str, token: IssuedToken) -> Result<(), Error> {
        self.save_at(provider_id, token, Utc::now())
    }

    pub fn save_at(
        &self,
        provider_id: &str,
        token: IssuedToken,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let before = self.enumerate(provider_id)?;
        let previous = before.len();
        let mut tokens: Vec<IssuedToken> = before
            .into_iter()
            .filter(|existing| !existing.is_expired_at(now) && !existing.same_scope_set(&token))
            .collect();
        debug!(
            "Saving token for provider {} (replacing {} of {} stored)",
            provider_id,
            previous - tokens.len(),
            previous
        );
        tokens.push(token);
        self.write(provider_id, tokens)
    }

    /// Find a live token for a provider that covers `requested_scopes`.
    ///
    /// # Returns
    ///
    /// `Some(IssuedToken)` on a hit, `None` on a miss. A miss is not an error.
    pub fn lookup(
        &self,
        provider_id: &str,
        requested_scopes: &[String],
    ) -> Result<Option<IssuedToken>, Error> {
        self.lookup_at(provider_id, requested_scopes, Utc::now())
    }

    pub fn lookup_at(
        &self,
        provider_id: &str,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Result<Option<IssuedToken>, Error> {
        Ok(self
            .enumerate(provider_id)?
            .into_iter()
            .find(|token| !token.is_expired_at(now) && token.covers(requested_scopes)))
    }

    /// Delete every token stored for a provider.
    pub fn wipe(&self, provider_id: &str) -> Result<(), Error> {
        debug!("Wiping tokens for provider {}", provider_id);
        self.storage.remove(&Self::key(provider_id))
    }

    /// All tokens stored for a provider, expired ones included.
    pub fn enumerate(&self, provider_id: &str) -> Result<Vec<IssuedToken>, Error> {
        let Some(raw) = self.storage.get(&Self::key(provider_id))? else {
            return Ok(Vec::new());
        };
        let stored: Vec<StoredToken> = serde_json::from_str(&raw)?;
        Ok(stored.into_iter().map(IssuedToken::from).collect())
    }

    fn write(&self, provider_id: &str, tokens: Vec<IssuedToken>) -> Result<(), Error> {
        let stored: Vec<StoredToken> = tokens.into_iter().map(IssuedToken::into_stored).collect();
        self.storage
            .set(&Self::key(provider_id), &serde_json::to_string(&stored)?)
    }

    fn key(provider_id: &str) -> String {
        format!("{}{}", TOKENS_PREFIX, provider_id)
    }
}
