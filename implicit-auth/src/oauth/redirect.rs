//! Navigation collaborator.

/// Trait for the host environment's user agent.
///
/// A browser host maps these onto `window.location`; a terminal host prints the
/// URL and reads the redirect back from the user.
pub trait RedirectGateway: Send + Sync {
    /// Send the user agent to `url`. Nothing after this runs in the same context on
    /// a real browser host.
    fn navigate(&self, url: &str);

    /// The full current location, saved so it can be restored after the redirect.
    fn current_location(&self) -> Option<String>;

    /// The current fragment without its leading `#`, if there is one.
    fn current_fragment(&self) -> Option<String>;

    /// Replace the current location without recording a new authorization request.
    fn set_location(&self, url: &str);

    /// Drop the current fragment so a reload does not process it again.
    fn clear_fragment(&self);
}

impl<R: RedirectGateway + ?Sized> RedirectGateway for std::sync::Arc<R> {
    fn navigate(&self, url: &str) {
        (**self).navigate(url)
    }

    fn current_location(&self) -> Option<String> {
        (**self).current_location()
    }

    fn current_fragment(&self) -> Option<String> {
        (**self).current_fragment()
    }

    fn set_location(&self, url: &str) {
        (**self).set_location(url)
    }

    fn clear_fragment(&self) {
        (**self).clear_fragment()
    }
}
