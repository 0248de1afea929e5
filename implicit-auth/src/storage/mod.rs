//! Key/value storage collaborator backing pending requests and tokens.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Error;

/// Trait for the string key/value store that survives navigation boundaries.
///
/// Pending requests and tokens share one backend under distinct key prefixes.
///
/// Implementations should:
/// - Persist across process restarts when used for real redirects
/// - Make `take` a single atomic step, never a `get` followed by a `remove`
pub trait KeyValueStorage: Send + Sync {
    /// Retrieve the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;

    /// Atomically read and remove the value stored under `key`.
    fn take(&self, key: &str) -> Result<Option<String>, Error>;

    /// List every key starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }

    fn take(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).take(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        (**self).keys_with_prefix(prefix)
    }
}
