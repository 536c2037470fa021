//! Platform keychain provider for persisted credentials
//!
//! Thin wrapper over `keyring::Entry` storing string secrets under a service
//! name (macOS Keychain, Windows Credential Manager, Linux Secret Service).
//! Token-specific helpers live in `auth::keychain`.
//!
//! ```no_run
//! use indivo_common::security::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("Indivo.oauth");
//! keychain.set_secret("access.app@apps.indivo.org", "token")?;
//! assert_eq!(keychain.get_secret("access.app@apps.indivo.org")?, "token");
//! # Ok::<(), indivo_common::security::KeychainError>(())
//! ```

use indivo_domain::IndivoError;
#[cfg(feature = "platform")]
use keyring::Entry;
use thiserror::Error;
#[cfg(feature = "platform")]
use tracing::debug;

/// Keychain provider for one service name
#[cfg(feature = "platform")]
pub struct KeychainProvider {
    service_name: String,
}

#[cfg(feature = "platform")]
impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Arguments
    /// * `service_name` - Service identifier (e.g., "Indivo.oauth")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Service name entries are stored under
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value in the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    /// Retrieve a secret value from the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if secret doesn't exist
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}"))
            }
        })
    }

    /// Delete a secret from the platform keychain (idempotent)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }

    /// Check if a secret exists in the keychain
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).map(|entry| entry.get_password().is_ok()).unwrap_or(false)
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Underlying keyring library error
    #[cfg(feature = "platform")]
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<KeychainError> for IndivoError {
    fn from(err: KeychainError) -> Self {
        IndivoError::Keychain(err.to_string())
    }
}
