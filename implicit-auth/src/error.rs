//! Error types for the `implicit-auth` crate.
//!
//! A root `Error` struct carries an `ErrorKind` plus an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for implicit-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in implicit-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Flow(FlowErrorKind),
    Token(TokenErrorKind),
    Storage(StorageErrorKind),
    Config(ConfigErrorKind),
}

/// Errors raised while initiating or completing an authorization flow.
#[derive(Debug, PartialEq)]
pub enum FlowErrorKind {
    /// No configuration is registered under the requested provider id.
    UnknownProvider,
    /// The redirect carried a state token that matches no pending request.
    UnknownState,
    /// The redirect carried no state and the caller gave no fallback provider.
    MissingProvider,
    /// The fragment looked like a token response but could not be used.
    MalformedFragment,
}

/// Errors from token lookups made on behalf of a caller.
#[derive(Debug, PartialEq)]
pub enum TokenErrorKind {
    NotFound,
}

/// Errors from the storage collaborator.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    Serialization,
    Io,
}

/// Errors from provider configuration.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    InvalidEndpoint,
    InvalidDocument,
}

impl Error {
    /// Returns the flow error kind, if this is a flow error.
    pub fn flow_kind(&self) -> Option<&FlowErrorKind> {
        match &self.error_kind {
            ErrorKind::Flow(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Flow(kind) => write!(f, "Authorization flow error: {:?}", kind)?,
            ErrorKind::Token(kind) => write!(f, "Token error: {:?}", kind)?,
            ErrorKind::Storage(kind) => write!(f, "Storage error: {:?}", kind)?,
            ErrorKind::Config(kind) => write!(f, "Configuration error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Serialization),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Io),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Config(ConfigErrorKind::InvalidEndpoint),
        }
    }
}

/// Helper function to create authorization flow errors.
pub fn flow_error(kind: FlowErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Flow(kind),
    }
}

/// Helper function to create token errors.
pub fn token_error(kind: TokenErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Token(kind),
    }
}

/// Helper function to create storage errors.
pub fn storage_error(kind: StorageErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage(kind),
    }
}

/// Helper function to create configuration errors.
pub fn config_error(kind: ConfigErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_display_includes_message() {
        let err = flow_error(FlowErrorKind::UnknownState, "state abc not pending");
        let rendered = err.to_string();
        assert!(rendered.contains("UnknownState"));
        assert!(rendered.contains("state abc not pending"));
    }

    #[test]
    fn test_flow_kind_only_for_flow_errors() {
        let err = flow_error(FlowErrorKind::MissingProvider, "no provider");
        assert_eq!(err.flow_kind(), Some(&FlowErrorKind::MissingProvider));

        let err = token_error(TokenErrorKind::NotFound, "no token");
        assert_eq!(err.flow_kind(), None);
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(
            err.error_kind,
            ErrorKind::Storage(StorageErrorKind::Serialization)
        );
        assert!(StdError::source(&err).is_some());
    }
}
