//! Redirect gateway for a terminal host, where the user carries URLs to and from a
//! browser by hand.

use std::sync::{Mutex, PoisonError};

use implicit_auth::oauth::RedirectGateway;
use log::{debug, info};

pub struct TerminalRedirect {
    location: Option<String>,
    authorization_urls: Mutex<Vec<String>>,
}

impl TerminalRedirect {
    pub fn new(location: Option<String>) -> Self {
        Self {
            location,
            authorization_urls: Mutex::new(Vec::new()),
        }
    }

    /// Authorization URLs navigated to since the last call, for the user to open.
    pub fn take_authorization_urls(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .authorization_urls
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl RedirectGateway for TerminalRedirect {
    fn navigate(&self, url: &str) {
        info!("Authorization required, waiting for the redirect to be completed");
        self.authorization_urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }

    fn current_location(&self) -> Option<String> {
        self.location.clone()
    }

    // Redirects are always passed explicitly on the command line.
    fn current_fragment(&self) -> Option<String> {
        None
    }

    fn set_location(&self, url: &str) {
        info!("Redirect processed, returning to {}", url);
    }

    fn clear_fragment(&self) {
        debug!("Redirect fragment discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigations_are_drained() {
        let redirect = TerminalRedirect::new(Some("https://app.example/".to_string()));
        redirect.navigate("https://auth.example/a");
        redirect.navigate("https://auth.example/b");

        assert_eq!(
            redirect.take_authorization_urls(),
            vec!["https://auth.example/a", "https://auth.example/b"]
        );
        assert!(redirect.take_authorization_urls().is_empty());
        assert_eq!(redirect.current_fragment(), None);
        assert_eq!(redirect.current_location().as_deref(), Some("https://app.example/"));
    }
}
