//! Security primitives: the platform keychain provider and its error type.

pub mod keychain;

#[cfg(feature = "platform")]
pub use keychain::KeychainProvider;
pub use keychain::KeychainError;
