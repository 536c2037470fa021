//! OAuth 1.0a credentials and signing
//!
//! ```text
//! ┌──────────────────┐
//! │ CredentialStore  │  in-memory credential + optional persistence
//! └────────┬─────────┘
//!          │
//!          ├──► Credential / TokenPair   (consumer + access tokens)
//!          ├──► OAuthSigner              (HMAC-SHA1 Authorization header)
//!          └──► KeychainTrait            (platform keychain or mock)
//! ```
//!
//! The session manager is the only writer of the store; calls only ever see
//! an [`OAuthSigner`].

pub mod credential_store;
#[cfg(feature = "platform")]
mod keychain;
pub mod oauth1;
pub mod traits;
pub mod types;

pub use credential_store::CredentialStore;
pub use oauth1::{generate_nonce, percent_encode, OAuthSigner};
pub use traits::KeychainTrait;
pub use types::{Credential, TokenPair, TokenResponse};
