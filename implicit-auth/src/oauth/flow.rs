//! Implicit-grant flow controller.
//!
//! Ties the provider registry, pending request store, token store, continuation
//! registry and redirect gateway together into the three protocol steps: initiate,
//! complete and ensure.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::RequestBuilder;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::continuation::{Continuation, ContinuationRegistry};
use super::fragment::{fragment_of, AuthorizationResponse};
use super::provider::{AuthorizationRequest, ProviderConfig, ProviderRegistry, TokenLifetime};
use super::redirect::RedirectGateway;
use super::state::{PendingAuthRequest, PendingRequestStore};
use super::token::{IssuedToken, TokenStore};
use crate::error::{flow_error, token_error, Error, FlowErrorKind, TokenErrorKind};
use crate::storage::KeyValueStorage;

/// Lifetime in seconds applied when neither the response nor the provider says otherwise.
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Source of the current time, injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// How a redirect response was matched to the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correlation {
    /// Matched by state token against a pending request.
    State,
    /// No state in the response; the caller's fallback provider was trusted instead.
    Uncorrelated,
}

/// Diagnostics snapshot of one configured provider.
#[derive(Debug, Clone)]
pub struct ProviderDump {
    pub provider_id: String,
    pub config: ProviderConfig,
    pub tokens: Vec<IssuedToken>,
}

/// Controller owning the whole implicit-grant lifecycle for one application.
///
/// The storage handle is cloned into both the pending request store and the token
/// store, so it must share its backing data between clones (`MemoryStorage` does,
/// and any backend can be wrapped in an `Arc`).
pub struct AuthFlowController<S, R>
where
    S: KeyValueStorage + Clone,
    R: RedirectGateway,
{
    registry: ProviderRegistry,
    pending: PendingRequestStore<S>,
    tokens: TokenStore<S>,
    continuations: ContinuationRegistry,
    redirect: R,
    clock: Clock,
}

impl<S, R> AuthFlowController<S, R>
where
    S: KeyValueStorage + Clone,
    R: RedirectGateway,
{
    /// Create a controller with an empty provider registry.
    pub fn new(storage: S, redirect: R) -> Self {
        Self {
            registry: ProviderRegistry::new(),
            pending: PendingRequestStore::new(storage.clone()),
            tokens: TokenStore::new(storage),
            continuations: ContinuationRegistry::new(),
            redirect,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for expiry arithmetic.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the provider registry wholesale.
    pub fn configure(&mut self, providers: BTreeMap<String, ProviderConfig>) -> Result<(), Error> {
        self.registry.configure(providers)?;
        debug!(
            "Configured providers: {:?}",
            self.registry.provider_ids().collect::<Vec<_>>()
        );
        Ok(())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn redirect(&self) -> &R {
        &self.redirect
    }

    /// Start an authorization request and navigate to the provider.
    ///
    /// # Arguments
    ///
    /// * `provider_id` - Configured provider to authorize against
    /// * `scopes` - Scopes to request; empty lets the provider apply its default
    /// * `continuation` - Work to resume once this flow's redirect is processed
    ///
    /// # Returns
    ///
    /// The authorization request that was navigated to.
    pub fn initiate(
        &self,
        provider_id: &str,
        scopes: &[String],
        continuation: Option<Continuation>,
    ) -> Result<AuthorizationRequest, Error> {
        let config = self.registry.get(provider_id)?;
        debug!("About to send an authorization request to [{}]", provider_id);

        let state = PendingRequestStore::<S>::generate_state();
        let request = config.authorization_request(&state, scopes)?;

        let pending = PendingAuthRequest {
            provider_id: provider_id.to_string(),
            scopes: scopes.to_vec(),
            location: self.redirect.current_location(),
            has_continuation: continuation.is_some(),
        };
        self.pending.put(&state, &pending)?;
        if let Some(continuation) = continuation {
            self.continuations.register(&state, continuation);
        }

        info!("Redirecting to authorization endpoint of {}", provider_id);
        self.redirect.navigate(request.url.as_str());
        Ok(request)
    }

    /// Process a redirect carrying an implicit-grant token response.
    ///
    /// # Arguments
    ///
    /// * `location` - Redirect URL or `#fragment`; `None` reads the gateway's current fragment
    /// * `fallback_provider` - Provider to trust when the response carries no state
    ///
    /// # Returns
    ///
    /// `Ok(None)` when there is no token response to process, the stored token otherwise.
    /// On error nothing is stored and the fragment is cleared so a reload does not retry.
    pub fn complete_from_redirect(
        &self,
        location: Option<&str>,
        fallback_provider: Option<&str>,
    ) -> Result<Option<IssuedToken>, Error> {
        let fragment = match location {
            Some(location) => fragment_of(location).map(str::to_string),
            None => self.redirect.current_fragment(),
        };
        let Some(fragment) = fragment else {
            return Ok(None);
        };

        let response = match AuthorizationResponse::from_fragment(&fragment) {
            Ok(Some(response)) => response,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.redirect.clear_fragment();
                return Err(e);
            }
        };
        let state = response.state.clone();

        match self.store_response(response, fallback_provider) {
            Ok((request, token)) => {
                match &request.location {
                    Some(location) => self.redirect.set_location(location),
                    None => self.redirect.clear_fragment(),
                }
                if let Some(state) = &state {
                    let invoked = self.continuations.take_and_invoke(state);
                    if request.has_continuation && !invoked {
                        debug!("Continuation for state [{}] did not survive navigation", state);
                    }
                }
                Ok(Some(token))
            }
            Err(e) => {
                // The pending request may already be consumed, so nothing could run it later.
                if let Some(state) = &state {
                    self.continuations.discard(state);
                }
                self.redirect.clear_fragment();
                Err(e)
            }
        }
    }

    /// Best-effort wrapper around [`complete_from_redirect`](Self::complete_from_redirect).
    ///
    /// Failures are logged and degrade to a cleared fragment.
    pub fn check_for_token(
        &self,
        location: Option<&str>,
        fallback_provider: Option<&str>,
    ) -> Option<IssuedToken> {
        match self.complete_from_redirect(location, fallback_provider) {
            Ok(token) => token,
            Err(e) => {
                warn!("Error when retrieving token from redirect: {}", e);
                None
            }
        }
    }

    /// Speculatively process the current fragment, falling back to the default provider.
    pub fn on_load(&self) -> Option<IssuedToken> {
        let fallback = self.registry.find_default();
        debug!("Checking for token on load, default provider {:?}", fallback);
        self.check_for_token(None, fallback)
    }

    /// Start a flow for every provider that lacks a matching token.
    ///
    /// Does not wait for any redirect to complete; callers re-check afterwards.
    ///
    /// # Returns
    ///
    /// Ids of the providers for which a flow was initiated.
    pub fn ensure_tokens<I, P>(&self, requirements: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = (P, Option<Vec<String>>)>,
        P: AsRef<str>,
    {
        let mut initiated = Vec::new();
        for (provider_id, scopes) in requirements {
            let provider_id = provider_id.as_ref();
            let scopes = scopes.unwrap_or_default();
            let now = (self.clock)();

            if self.tokens.lookup_at(provider_id, &scopes, now)?.is_some() {
                debug!("Ensure token for provider [{}]: present", provider_id);
                continue;
            }
            debug!("Ensure token for provider [{}]: missing", provider_id);
            self.initiate(provider_id, &scopes, None)?;
            initiated.push(provider_id.to_string());
        }
        Ok(initiated)
    }

    /// Look up a live access token. Never starts a flow.
    pub fn get_access_token(
        &self,
        provider_id: &str,
        scopes: &[String],
    ) -> Result<Option<SecretString>, Error> {
        Ok(self
            .tokens
            .lookup_at(provider_id, scopes, (self.clock)())?
            .map(|token| token.access_token))
    }

    /// Attach a live token to an outgoing request the way the provider expects.
    pub fn authorize(
        &self,
        provider_id: &str,
        scopes: &[String],
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        let config = self.registry.get(provider_id)?;
        let token = self
            .tokens
            .lookup_at(provider_id, scopes, (self.clock)())?
            .ok_or_else(|| {
                token_error(
                    TokenErrorKind::NotFound,
                    &format!("No valid token for provider {}", provider_id),
                )
            })?;
        Ok(config.presentation.apply(request, &token.access_token))
    }

    /// Drop a provider's tokens after a resource server rejected one with 401.
    pub fn handle_unauthorized(&self, provider_id: &str) -> Result<(), Error> {
        info!("Token rejected by resource server, wiping tokens for {}", provider_id);
        self.tokens.wipe(provider_id)
    }

    pub fn wipe(&self, provider_id: &str) -> Result<(), Error> {
        self.tokens.wipe(provider_id)
    }

    /// Wipe tokens of every configured provider.
    pub fn wipe_all(&self) -> Result<(), Error> {
        for provider_id in self.registry.provider_ids() {
            info!("Wiping tokens for {}", provider_id);
            self.tokens.wipe(provider_id)?;
        }
        Ok(())
    }

    /// Snapshot configuration and stored tokens of every configured provider.
    pub fn dump(&self) -> Result<Vec<ProviderDump>, Error> {
        let mut dump = Vec::with_capacity(self.registry.len());
        for (provider_id, config) in self.registry.iter() {
            let tokens = self.tokens.enumerate(provider_id)?;
            debug!(
                "Provider [{}]: {:?}, {} stored token(s)",
                provider_id,
                config,
                tokens.len()
            );
            dump.push(ProviderDump {
                provider_id: provider_id.to_string(),
                config: config.clone(),
                tokens,
            });
        }
        Ok(dump)
    }

    /// State tokens of flows whose redirect never came back.
    pub fn pending_states(&self) -> Result<Vec<String>, Error> {
        self.pending.pending_states()
    }

    /// Resolve a parsed response into a stored token. Writes nothing on error.
    fn store_response(
        &self,
        response: AuthorizationResponse,
        fallback_provider: Option<&str>,
    ) -> Result<(PendingAuthRequest, IssuedToken), Error> {
        let (request, correlation) = match &response.state {
            Some(state) => {
                let request = self.pending.take(state)?.ok_or_else(|| {
                    flow_error(
                        FlowErrorKind::UnknownState,
                        &format!("Could not retrieve state [{}]", state),
                    )
                })?;
                (request, Correlation::State)
            }
            None => {
                let provider_id = fallback_provider.ok_or_else(|| {
                    flow_error(
                        FlowErrorKind::MissingProvider,
                        "Could not get [state] and no default provider is provided",
                    )
                })?;
                warn!(
                    "Token response without state, trusting fallback provider {} (uncorrelated)",
                    provider_id
                );
                let request = PendingAuthRequest {
                    provider_id: provider_id.to_string(),
                    scopes: Vec::new(),
                    location: None,
                    has_continuation: false,
                };
                (request, Correlation::Uncorrelated)
            }
        };

        let config = self.registry.get(&request.provider_id)?;
        let now = (self.clock)();
        let scopes = resolve_scopes(&response, &request, config, correlation);
        let expires_at = resolve_expiry(response.expires_in, config, scopes.as_deref(), now);

        let token = IssuedToken {
            access_token: SecretString::new(response.access_token),
            token_type: response.token_type,
            expires_at,
            scopes,
            extra: response.extra,
        };
        self.tokens
            .save_at(&request.provider_id, token.clone(), now)?;
        info!(
            "Stored token for provider {} (expires {:?})",
            request.provider_id, token.expires_at
        );

        Ok((request, token))
    }
}

/// Granted scopes: the response's, else the request's, else unscoped.
///
/// Only an uncorrelated response inherits the provider's default scope.
fn resolve_scopes(
    response: &AuthorizationResponse,
    request: &PendingAuthRequest,
    config: &ProviderConfig,
    correlation: Correlation,
) -> Option<Vec<String>> {
    if let Some(scope) = &response.scope {
        return Some(scope.clone());
    }
    if !request.scopes.is_empty() {
        return Some(request.scopes.clone());
    }
    match correlation {
        Correlation::Uncorrelated if !config.scope.is_empty() => Some(config.scope.clone()),
        _ => None,
    }
}

/// Expiry in strict priority order: response `expires_in`, provider lifetime,
/// permanent scope, library default.
///
/// A provider lifetime of zero seconds counts as unset.
fn resolve_expiry(
    expires_in: Option<u64>,
    config: &ProviderConfig,
    scopes: Option<&[String]>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(secs) = expires_in {
        return after(now, secs);
    }
    match config.default_lifetime {
        Some(TokenLifetime::Never) => None,
        Some(TokenLifetime::Seconds(secs)) if secs > 0 => after(now, secs),
        _ => {
            let permanent = config.permanent_scope.as_deref().is_some_and(|permanent| {
                scopes.is_some_and(|scopes| scopes.iter().any(|s| s == permanent))
            });
            if permanent {
                None
            } else {
                after(now, DEFAULT_LIFETIME_SECS)
            }
        }
    }
}

/// `now + secs`, or `None` when the sum is past what a timestamp can hold.
fn after(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
}
