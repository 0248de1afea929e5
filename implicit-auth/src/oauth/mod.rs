//! OAuth 2.0 implicit grant infrastructure.
//!
//! Provides the authorization request, redirect completion and token lifecycle for
//! clients that receive their access token in the redirect fragment.

mod continuation;
mod flow;
mod fragment;
mod provider;
mod redirect;
mod state;

pub mod token;

pub use continuation::{Continuation, ContinuationRegistry};
pub use flow::{AuthFlowController, Clock, ProviderDump, DEFAULT_LIFETIME_SECS};
pub use fragment::{fragment_of, AuthorizationResponse};
pub use provider::{
    AuthorizationRequest, ProviderConfig, ProviderRegistry, TokenLifetime, TokenPresentation,
};
pub use redirect::RedirectGateway;
pub use state::{PendingAuthRequest, PendingRequestStore};
