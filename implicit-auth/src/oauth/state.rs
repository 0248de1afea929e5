//! CSRF state tracking for in-flight authorization requests.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::storage::KeyValueStorage;

const STATE_PREFIX: &str = "state-";

/// Authorization request waiting for its redirect to come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthRequest {
    /// Provider the request was sent to.
    pub provider_id: String,
    /// Scopes that were requested. Empty means the provider default was used.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Location to restore once the token has been stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Whether a continuation was registered in the originating context.
    #[serde(default)]
    pub has_continuation: bool,
}

/// Store for pending requests keyed by state token.
///
/// A pending request can be read exactly once, so a replayed redirect never resolves twice.
pub struct PendingRequestStore<S: KeyValueStorage> {
    storage: S,
}

impl<S: KeyValueStorage> PendingRequestStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Generate a state token with 256 bits of randomness.
    pub fn generate_state() -> String {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(random_bytes)
    }

    /// Save `request` under `state`.
    pub fn put(&self, state: &str, request: &PendingAuthRequest) -> Result<(), Error> {
        debug!("Saving state [{}] for provider {}", state, request.provider_id);
        self.storage
            .set(&Self::key(state), &serde_json::to_string(request)?)
    }

    /// Remove and return the request saved under `state`.
    ///
    /// # Returns
    ///
    /// `Some(PendingAuthRequest)` the first time, `None` afterwards or for unknown states.
    pub fn take(&self, state: &str) -> Result<Option<PendingAuthRequest>, Error> {
        match self.storage.take(&Self::key(state))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// State tokens whose redirect has not come back yet.
    ///
    /// Abandoned flows are never reclaimed automatically; this is how they are observed.
    pub fn pending_states(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .storage
            .keys_with_prefix(STATE_PREFIX)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(STATE_PREFIX).map(str::to_string))
            .collect())
    }

    fn key(state: &str) -> String {
        format!("{}{}", STATE_PREFIX, state)
    }
}
