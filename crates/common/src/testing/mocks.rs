//! Mock implementations of common traits

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::{KeychainTrait, TokenPair};
use crate::security::KeychainError;

type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory keychain provider mirroring `KeychainProvider`'s entry layout
///
/// Clones share storage, so a test can keep a handle while the code under
/// test owns another.
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    storage: StorageData,
    service_name: String,
    should_fail: Arc<AtomicBool>,
    store_calls: Arc<AtomicUsize>,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            service_name: service_name.into(),
            should_fail: Arc::new(AtomicBool::new(false)),
            store_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Service name this mock was created with
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every subsequent operation fail with `AccessFailed`.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Number of `store_tokens` calls so far
    #[must_use]
    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Store an arbitrary secret value in memory.
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check()?;
        self.storage.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Retrieve a secret value or return `KeychainError::NotFound`.
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.check()?;
        self.storage.lock().unwrap().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    /// Delete a secret value (idempotent).
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.check()?;
        self.storage.lock().unwrap().remove(key);
        Ok(())
    }

    /// Determine whether a secret exists.
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.storage.lock().unwrap().contains_key(key)
    }

    /// Store an access token pair under an account identifier.
    pub fn store_tokens(&self, account: &str, tokens: &TokenPair) -> Result<(), KeychainError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.set_secret(&format!("access.{account}"), &tokens.token)?;
        self.set_secret(&format!("secret.{account}"), &tokens.secret)
    }

    /// Retrieve the token pair for an account.
    pub fn retrieve_tokens(&self, account: &str) -> Result<TokenPair, KeychainError> {
        let token = self.get_secret(&format!("access.{account}"))?;
        let secret = self.get_secret(&format!("secret.{account}"))?;
        Ok(TokenPair { token, secret })
    }

    /// Delete the token pair for an account.
    pub fn delete_tokens(&self, account: &str) -> Result<(), KeychainError> {
        self.delete_secret(&format!("access.{account}"))?;
        self.delete_secret(&format!("secret.{account}"))
    }

    /// Determine whether tokens exist for an account.
    #[must_use]
    pub fn has_tokens(&self, account: &str) -> bool {
        self.secret_exists(&format!("access.{account}"))
    }

    fn check(&self) -> Result<(), KeychainError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed("mock keychain unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MockKeychainProvider {
    fn default() -> Self {
        Self::new("indivo-test")
    }
}

#[async_trait]
impl KeychainTrait for MockKeychainProvider {
    async fn store_tokens(&self, account: &str, tokens: &TokenPair) -> Result<(), KeychainError> {
        MockKeychainProvider::store_tokens(self, account, tokens)
    }

    async fn retrieve_tokens(&self, account: &str) -> Result<TokenPair, KeychainError> {
        MockKeychainProvider::retrieve_tokens(self, account)
    }

    async fn delete_tokens(&self, account: &str) -> Result<(), KeychainError> {
        MockKeychainProvider::delete_tokens(self, account)
    }

    async fn has_tokens(&self, account: &str) -> bool {
        MockKeychainProvider::has_tokens(self, account)
    }
}
