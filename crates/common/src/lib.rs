//! Shared building blocks for the Indivo session client.
//!
//! - [`auth`]: OAuth 1.0a signing, credential types and the credential store
//! - [`error`]: retryability and severity classification for `IndivoError`
//! - [`security`]: platform keychain provider (feature `platform`)
//! - [`testing`]: in-memory mocks (feature `test-utils`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod error;
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{Credential, CredentialStore, KeychainTrait, OAuthSigner, TokenPair};
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "platform")]
pub use security::KeychainProvider;
pub use security::KeychainError;
