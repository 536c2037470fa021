//! Credential store with optional keychain persistence
//!
//! Holds the current [`Credential`] in memory. When persistence is enabled
//! the access token pair is mirrored into the keychain on `set` and removed
//! on `clear` / `invalidate_access`, and `initialize` restores it on startup.

use std::sync::Arc;

use indivo_domain::{IndivoError, ServerConfig};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::oauth1::OAuthSigner;
use super::traits::KeychainTrait;
use super::types::Credential;
use crate::security::KeychainError;

/// In-memory credential plus optional persisted copy
pub struct CredentialStore {
    keychain: Arc<dyn KeychainTrait>,
    account: String,
    consumer_key: String,
    consumer_secret: String,
    persist: bool,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `keychain` - Persistence backend
    /// * `account` - Keychain account the token pair is stored under
    /// * `consumer_key` / `consumer_secret` - Consumer credential restored
    ///   tokens are paired with
    /// * `persist` - Mirror access tokens into the keychain
    #[must_use]
    pub fn new(
        keychain: Arc<dyn KeychainTrait>,
        account: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        persist: bool,
    ) -> Self {
        Self {
            keychain,
            account: account.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            persist,
            current: RwLock::new(None),
        }
    }

    /// Store for a server configuration (account = `app_id`)
    #[must_use]
    pub fn for_config(keychain: Arc<dyn KeychainTrait>, config: &ServerConfig) -> Self {
        Self::new(
            keychain,
            config.app_id.clone(),
            config.client_key.clone(),
            config.client_secret.clone(),
            config.store_credentials,
        )
    }

    /// Load a persisted access token
    ///
    /// Returns `Ok(true)` when a credential was restored. A missing entry is
    /// not an error.
    ///
    /// # Errors
    /// Returns `IndivoError::Keychain` if the keychain cannot be read
    pub async fn initialize(&self) -> Result<bool, IndivoError> {
        if !self.persist {
            debug!("Credential persistence disabled, nothing to restore");
            return Ok(false);
        }

        match self.keychain.retrieve_tokens(&self.account).await {
            Ok(tokens) => {
                let credential = Credential::consumer(&self.consumer_key, &self.consumer_secret)
                    .with_access(tokens);
                *self.current.write().await = Some(credential);
                info!(account = %self.account, "Restored persisted access token");
                Ok(true)
            }
            Err(KeychainError::NotFound) => {
                debug!(account = %self.account, "No persisted access token found");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current credential, if any
    pub async fn get(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    /// Signer for the current access token
    ///
    /// `None` when no access token has been issued.
    pub async fn access_signer(&self) -> Option<OAuthSigner> {
        self.current.read().await.as_ref().filter(|c| c.is_authorized()).map(Credential::signer)
    }

    /// Whether an access token is held in memory
    pub async fn is_authorized(&self) -> bool {
        self.current.read().await.as_ref().is_some_and(Credential::is_authorized)
    }

    /// Replace the current credential
    ///
    /// # Errors
    /// Returns `IndivoError::Keychain` if persisting the access token fails;
    /// the in-memory credential is not changed in that case
    pub async fn set(&self, credential: Credential) -> Result<(), IndivoError> {
        if self.persist {
            if let Some(access) = credential.access() {
                self.keychain.store_tokens(&self.account, access).await?;
                debug!(account = %self.account, "Persisted access token");
            }
        }

        *self.current.write().await = Some(credential);
        Ok(())
    }

    /// Remove the in-memory and persisted credential
    ///
    /// # Errors
    /// Returns `IndivoError::Keychain` if the persisted copy cannot be
    /// removed; memory is cleared regardless
    pub async fn clear(&self) -> Result<(), IndivoError> {
        self.current.write().await.take();
        self.delete_persisted().await
    }

    /// Drop the access token after the server rejected it
    ///
    /// Only acts while `rejected` is still the current access token, so a
    /// late rejection of a replaced token leaves the new one alone. The
    /// consumer credential stays; the persisted token pair is removed.
    /// Returns whether the token was dropped.
    ///
    /// # Errors
    /// Returns `IndivoError::Keychain` if the persisted copy cannot be removed
    pub async fn invalidate_access(&self, rejected: &str) -> Result<bool, IndivoError> {
        {
            let mut current = self.current.write().await;
            let Some(credential) = current.as_mut().filter(|c| c.access_token() == Some(rejected))
            else {
                debug!(account = %self.account, "Rejected token is no longer current");
                return Ok(false);
            };
            credential.revoke_access();
        }
        warn!(account = %self.account, "Access token invalidated");
        self.delete_persisted().await?;
        Ok(true)
    }

    async fn delete_persisted(&self) -> Result<(), IndivoError> {
        if self.persist {
            self.keychain.delete_tokens(&self.account).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("account", &self.account)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::TokenPair;
    use crate::testing::MockKeychainProvider;

    fn store(keychain: Arc<MockKeychainProvider>, persist: bool) -> CredentialStore {
        CredentialStore::new(keychain, "app@apps.indivo.org", "key", "secret", persist)
    }

    fn authorized() -> Credential {
        Credential::consumer("key", "secret").with_access(TokenPair::new("tok", "tok-secret"))
    }

    /// Validates `CredentialStore::set` behavior for the persisted credential
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the keychain holds the token pair after `set`.
    /// - Ensures a fresh store restores it through `initialize`.
    #[tokio::test]
    async fn set_persists_and_initialize_restores() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let first = store(keychain.clone(), true);
        first.set(authorized()).await.unwrap();
        assert!(keychain.has_tokens("app@apps.indivo.org"));

        let second = store(keychain, true);
        assert!(second.initialize().await.unwrap());
        let restored = second.get().await.unwrap();
        assert_eq!(restored.access_token(), Some("tok"));
        assert_eq!(restored.consumer_token(), "key");
    }

    #[tokio::test]
    async fn initialize_without_persisted_token_is_not_an_error() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let store = store(keychain, true);

        assert!(!store.initialize().await.unwrap());
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn initialize_surfaces_keychain_failures() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        keychain.set_should_fail(true);
        let store = store(keychain, true);

        assert!(matches!(store.initialize().await, Err(IndivoError::Keychain(_))));
    }

    #[tokio::test]
    async fn memory_only_store_never_touches_keychain() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let store = store(keychain.clone(), false);

        store.set(authorized()).await.unwrap();
        assert!(store.is_authorized().await);
        assert!(!keychain.has_tokens("app@apps.indivo.org"));
        assert!(!store.initialize().await.unwrap());
    }

    /// Validates `CredentialStore::clear` behavior for the logout scenario.
    ///
    /// Assertions:
    /// - Ensures memory and keychain are both empty afterwards.
    /// - Ensures clearing twice succeeds.
    #[tokio::test]
    async fn clear_removes_memory_and_persisted_copies() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let store = store(keychain.clone(), true);
        store.set(authorized()).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(store.get().await.is_none());
        assert!(store.access_signer().await.is_none());
        assert!(!keychain.has_tokens("app@apps.indivo.org"));
    }

    #[tokio::test]
    async fn invalidate_access_keeps_consumer_credential() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let store = store(keychain.clone(), true);
        store.set(authorized()).await.unwrap();
        assert!(store.access_signer().await.is_some());

        assert!(store.invalidate_access("tok").await.unwrap());

        let remaining = store.get().await.unwrap();
        assert!(!remaining.is_authorized());
        assert!(store.access_signer().await.is_none());
        assert!(!keychain.has_tokens("app@apps.indivo.org"));
    }

    #[tokio::test]
    async fn invalidate_access_ignores_replaced_token() {
        let keychain = Arc::new(MockKeychainProvider::new("Indivo.test"));
        let store = store(keychain.clone(), true);
        store.set(authorized()).await.unwrap();

        assert!(!store.invalidate_access("older-token").await.unwrap());

        assert!(store.is_authorized().await);
        assert!(keychain.has_tokens("app@apps.indivo.org"));
    }
}
