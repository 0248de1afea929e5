//! Issued token types, storage and presentation.

mod presentation;
mod storage;
mod tokens;

pub use presentation::ACCESS_TOKEN_PARAM;
pub use storage::TokenStore;
pub use tokens::{IssuedToken, StoredToken};
