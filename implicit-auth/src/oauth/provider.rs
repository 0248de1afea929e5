//! Provider configuration and the registry that holds it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{config_error, flow_error, ConfigErrorKind, Error, FlowErrorKind};

/// Lifetime applied to tokens whose response carries no `expires_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLifetime")]
pub enum TokenLifetime {
    /// Tokens from this provider never expire locally.
    Never,
    /// Tokens expire this many seconds after they were received.
    Seconds(u64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLifetime {
    Seconds(u64),
    Flag(bool),
    Word(String),
}

impl TryFrom<RawLifetime> for TokenLifetime {
    type Error = String;

    fn try_from(raw: RawLifetime) -> Result<Self, Self::Error> {
        match raw {
            RawLifetime::Seconds(secs) => Ok(TokenLifetime::Seconds(secs)),
            RawLifetime::Flag(false) => Ok(TokenLifetime::Never),
            RawLifetime::Word(word) if word.eq_ignore_ascii_case("never") => {
                Ok(TokenLifetime::Never)
            }
            RawLifetime::Flag(true) => Err("default_lifetime cannot be `true`".to_string()),
            RawLifetime::Word(word) => Err(format!("unrecognized default_lifetime `{}`", word)),
        }
    }
}

impl Serialize for TokenLifetime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TokenLifetime::Never => serializer.serialize_str("never"),
            TokenLifetime::Seconds(secs) => serializer.serialize_u64(*secs),
        }
    }
}

/// How an access token is handed to resource servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPresentation {
    /// `Authorization: Bearer <token>`
    #[default]
    #[serde(rename = "header")]
    AuthorizationHeader,
    /// `?access_token=<token>`
    #[serde(rename = "qs")]
    QueryString,
}

/// Configuration for a single authorization server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint the user agent is sent to.
    pub authorization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Default scopes, accepted either as a list or a space-separated string.
    #[serde(default, deserialize_with = "deserialize_scope")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_lifetime: Option<TokenLifetime>,
    /// Scope whose presence on a token means it never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_scope: Option<String>,
    #[serde(default, rename = "presenttoken")]
    pub presentation: TokenPresentation,
    #[serde(default, rename = "isDefault")]
    pub is_default: bool,
}

fn deserialize_scope<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScope {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match RawScope::deserialize(deserializer)? {
        RawScope::List(list) => list,
        RawScope::Joined(joined) => joined.split_whitespace().map(str::to_string).collect(),
    })
}

/// Authorization URL together with the state token it carries.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL to redirect the user to.
    pub url: Url,
    /// CSRF state parameter for validation.
    pub state: String,
}

impl ProviderConfig {
    /// Create a configuration pointing at `authorization` with every optional field unset.
    pub fn new(authorization: impl Into<String>) -> Self {
        Self {
            authorization: authorization.into(),
            client_id: None,
            redirect_uri: None,
            scope: Vec::new(),
            default_lifetime: None,
            permanent_scope: None,
            presentation: TokenPresentation::default(),
            is_default: false,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_scope<I, T>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lifetime(mut self, lifetime: TokenLifetime) -> Self {
        self.default_lifetime = Some(lifetime);
        self
    }

    pub fn with_permanent_scope(mut self, scope: impl Into<String>) -> Self {
        self.permanent_scope = Some(scope.into());
        self
    }

    pub fn with_presentation(mut self, presentation: TokenPresentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Build the implicit-grant authorization URL for `state`.
    ///
    /// Query parameters already present on the endpoint are kept. An empty
    /// `scopes` slice omits the `scope` parameter so the provider applies its default.
    pub fn authorization_request(
        &self,
        state: &str,
        scopes: &[String],
    ) -> Result<AuthorizationRequest, Error> {
        let mut url = Url::parse(&self.authorization)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "token");
            pairs.append_pair("state", state);
            if let Some(redirect_uri) = &self.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }
            if let Some(client_id) = &self.client_id {
                pairs.append_pair("client_id", client_id);
            }
            if !scopes.is_empty() {
                pairs.append_pair("scope", &scopes.join(" "));
            }
        }

        Ok(AuthorizationRequest {
            url,
            state: state.to_string(),
        })
    }
}

/// Registry of provider configurations keyed by provider id.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document mapping provider ids to configurations.
    pub fn parse_document(document: &str) -> Result<BTreeMap<String, ProviderConfig>, Error> {
        serde_json::from_str(document).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::Config(ConfigErrorKind::InvalidDocument),
        })
    }

    /// Replace the whole registry.
    ///
    /// Every endpoint is validated first; on error the previous registry is kept intact.
    pub fn configure(&mut self, providers: BTreeMap<String, ProviderConfig>) -> Result<(), Error> {
        for (id, config) in &providers {
            Url::parse(&config.authorization).map_err(|e| {
                config_error(
                    ConfigErrorKind::InvalidEndpoint,
                    &format!("provider {} has invalid authorization endpoint: {}", id, e),
                )
            })?;
        }
        self.providers = providers;
        Ok(())
    }

    /// Get the configuration for `provider_id`.
    pub fn get(&self, provider_id: &str) -> Result<&ProviderConfig, Error> {
        self.providers.get(provider_id).ok_or_else(|| {
            flow_error(
                FlowErrorKind::UnknownProvider,
                &format!("Could not find configuration for provider {}", provider_id),
            )
        })
    }

    /// The provider flagged `isDefault`, or the only provider when exactly one is configured.
    pub fn find_default(&self) -> Option<&str> {
        self.providers
            .iter()
            .find(|(_, config)| config.is_default)
            .map(|(id, _)| id.as_str())
            .or_else(|| match self.providers.len() {
                1 => self.providers.keys().next().map(String::as_str),
                _ => None,
            })
    }

    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderConfig)> {
        self.providers.iter().map(|(id, config)| (id.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Display for TokenLifetime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenLifetime::Never => write!(f, "never"),
            TokenLifetime::Seconds(secs) => write!(f, "{}s", secs),
        }
    }
}
