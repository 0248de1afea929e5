//! Parsing of implicit-grant redirect fragments.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::error::{flow_error, Error, FlowErrorKind};

const ACCESS_TOKEN: &str = "access_token";
const TOKEN_TYPE: &str = "token_type";
const STATE: &str = "state";
const EXPIRES_IN: &str = "expires_in";
const SCOPE: &str = "scope";

/// Token response carried in a redirect fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub state: Option<String>,
    /// Lifetime in seconds counted from the moment the redirect is processed.
    pub expires_in: Option<u64>,
    /// Granted scopes, split on whitespace.
    pub scope: Option<Vec<String>>,
    /// Every other field, verbatim.
    pub extra: BTreeMap<String, String>,
}

/// Return the fragment of `location` without its leading `#`.
///
/// `None` if the location has no fragment at all.
pub fn fragment_of(location: &str) -> Option<&str> {
    location.find('#').map(|idx| &location[idx + 1..])
}

impl AuthorizationResponse {
    /// Parse a fragment (with or without its leading `#`).
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the fragment is not a token response at all, which is the
    /// normal case on ordinary page loads. `Err(MalformedFragment)` when it carries
    /// the `access_token` marker but no usable token, or when `expires_in` is present
    /// but is not a whole number of seconds (`"3600.0"` and `"60s"` are rejected
    /// rather than truncated).
    pub fn from_fragment(fragment: &str) -> Result<Option<Self>, Error> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if fragment.is_empty() || !fragment.contains(ACCESS_TOKEN) {
            return Ok(None);
        }

        let mut params: BTreeMap<String, String> = form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        let access_token = non_empty(&mut params, ACCESS_TOKEN).ok_or_else(|| {
            flow_error(
                FlowErrorKind::MalformedFragment,
                "fragment mentions access_token but carries no token",
            )
        })?;

        let expires_in = non_empty(&mut params, EXPIRES_IN)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    flow_error(
                        FlowErrorKind::MalformedFragment,
                        &format!("expires_in is not a number of seconds: {}", raw),
                    )
                })
            })
            .transpose()?;

        let scope = non_empty(&mut params, SCOPE)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect());

        Ok(Some(Self {
            access_token,
            token_type: non_empty(&mut params, TOKEN_TYPE),
            state: non_empty(&mut params, STATE),
            expires_in,
            scope,
            extra: params,
        }))
    }
}

fn non_empty(params: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    params.remove(key).filter(|value| !value.is_empty())
}
