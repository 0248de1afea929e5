//! Attaching access tokens to outgoing resource requests.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use crate::oauth::TokenPresentation;

/// Query parameter used when a provider wants the token in the query string.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

impl TokenPresentation {
    /// Apply `token` to a request builder.
    ///
    /// Uses the standard `Authorization: Bearer <token>` header unless the provider
    /// asked for the `access_token` query parameter.
    pub fn apply(&self, request: RequestBuilder, token: &SecretString) -> RequestBuilder {
        match self {
            TokenPresentation::AuthorizationHeader => request.bearer_auth(token.expose_secret()),
            TokenPresentation::QueryString => {
                request.query(&[(ACCESS_TOKEN_PARAM, token.expose_secret().as_str())])
            }
        }
    }
}
