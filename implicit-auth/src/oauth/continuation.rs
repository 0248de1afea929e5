//! Callbacks resumed once a redirect completes.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Work to resume after the token for a flow has been stored.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Registry of continuations keyed by state token.
///
/// Lives only in memory: a continuation registered before a full navigation is gone
/// once the context is replaced, and the pending request records that one existed.
#[derive(Default)]
pub struct ContinuationRegistry {
    continuations: Mutex<HashMap<String, Continuation>>,
}

impl ContinuationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `continuation` for `state`, replacing any earlier one.
    pub fn register(&self, state: &str, continuation: Continuation) {
        self.continuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.to_string(), continuation);
    }

    /// Remove and run the continuation for `state`.
    ///
    /// # Returns
    ///
    /// `true` if a continuation was found and invoked.
    pub fn take_and_invoke(&self, state: &str) -> bool {
        // Release the lock before running caller code, which may register again.
        let continuation = self
            .continuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state);

        match continuation {
            Some(continuation) => {
                continuation();
                true
            }
            None => false,
        }
    }

    /// Drop the continuation for `state` without running it.
    pub fn discard(&self, state: &str) -> bool {
        self.continuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)
            .is_some()
    }

    pub fn is_registered(&self, state: &str) -> bool {
        self.continuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_invoked_at_most_once() {
        let registry = ContinuationRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register("s1", Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(registry.take_and_invoke("s1"));
        assert!(!registry.take_and_invoke("s1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_registered("s1"));
    }

    #[test]
    fn test_discard_drops_without_invoking() {
        let registry = ContinuationRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register("s1", Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(registry.discard("s1"));
        assert!(!registry.discard("s1"));
        assert!(!registry.take_and_invoke("s1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_state_is_noop() {
        let registry = ContinuationRegistry::new();
        assert!(!registry.take_and_invoke("missing"));
    }
}
