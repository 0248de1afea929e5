//! # implicit-auth
//!
//! Client-side token lifecycle for the OAuth 2.0 implicit grant:
//! - Provider configuration registry
//! - Authorization requests correlated by a read-once CSRF state token
//! - Redirect fragment parsing with expiry and scope resolution
//! - Token storage with scope-superset lookup and lazy expiry
//!
//! ## Architecture
//!
//! Navigation and persistence are collaborators supplied by the host:
//! - `oauth::RedirectGateway` moves the user agent and reports its location
//! - `storage::KeyValueStorage` keeps pending requests and tokens across navigations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use implicit_auth::{
//!     oauth::{AuthFlowController, ProviderConfig},
//!     storage::MemoryStorage,
//! };
//!
//! let mut controller = AuthFlowController::new(MemoryStorage::new(), browser);
//! controller.configure(providers)?;
//! controller.on_load();
//! controller.ensure_tokens([("google", Some(vec!["email".to_string()]))])?;
//! ```

pub mod error;
pub mod oauth;
pub mod storage;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
