//! Error types used throughout the session layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Indivo session operations
///
/// Cloneable so a single handshake outcome can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum IndivoError {
    /// A required setting is missing or malformed; carries the field name.
    #[error("Configuration error: missing or invalid '{0}'")]
    Configuration(String),

    /// Handshake declined, timed out, or rejected by the server.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Discovery returned no accessible records.
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Call cancelled before dispatch.
    #[error("Call cancelled")]
    Cancelled,

    /// The session was logged out while the operation was in flight.
    #[error("Session invalidated by logout")]
    SessionInvalidated,

    /// A single-use completion was resolved twice. Logic fault.
    #[error("Completion resolved more than once: {0}")]
    DoubleCompletion(String),

    /// Non-success HTTP status other than an authorization rejection.
    #[error("Server responded with {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Keychain error: {0}")]
    Keychain(String),
}

impl IndivoError {
    /// Shorthand for a configuration error on `field`.
    pub fn missing(field: &str) -> Self {
        Self::Configuration(field.to_string())
    }

    /// `true` for outcomes expected under concurrent logout or cancellation.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Cancelled | Self::SessionInvalidated)
    }
}

/// Result type alias for Indivo operations
pub type Result<T> = std::result::Result<T, IndivoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_field() {
        let err = IndivoError::missing("client_secret");
        assert_eq!(err, IndivoError::Configuration("client_secret".to_string()));
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn benign_outcomes() {
        assert!(IndivoError::Cancelled.is_benign());
        assert!(IndivoError::SessionInvalidated.is_benign());
        assert!(!IndivoError::Network("reset".to_string()).is_benign());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(IndivoError::Discovery("none".to_string())).unwrap();
        assert_eq!(json["type"], "Discovery");
        assert_eq!(json["message"], "none");
    }
}
