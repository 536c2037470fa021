//! Access-token storage helpers layered on top of `KeychainProvider`.
//!
//! The token and its secret live in two keychain entries, `access.<account>`
//! and `secret.<account>`, under the provider's service name.

use async_trait::async_trait;
use tracing::debug;

use crate::auth::traits::KeychainTrait;
use crate::auth::types::TokenPair;
use crate::security::{KeychainError, KeychainProvider};

pub(crate) const ACCESS_PREFIX: &str = "access.";
pub(crate) const SECRET_PREFIX: &str = "secret.";

impl KeychainProvider {
    /// Persist an access token pair in the platform keychain.
    pub fn store_tokens(&self, account: &str, tokens: &TokenPair) -> Result<(), KeychainError> {
        debug!(account = %account, "Storing access token");

        self.set_secret(&format!("{ACCESS_PREFIX}{account}"), &tokens.token)?;
        self.set_secret(&format!("{SECRET_PREFIX}{account}"), &tokens.secret)?;

        Ok(())
    }

    /// Retrieve the access token pair for the specified account.
    pub fn retrieve_tokens(&self, account: &str) -> Result<TokenPair, KeychainError> {
        debug!(account = %account, "Retrieving access token");

        let token = self.get_secret(&format!("{ACCESS_PREFIX}{account}"))?;
        let secret = self.get_secret(&format!("{SECRET_PREFIX}{account}"))?;

        Ok(TokenPair { token, secret })
    }

    /// Delete the access token pair associated with the given account.
    pub fn delete_tokens(&self, account: &str) -> Result<(), KeychainError> {
        debug!(account = %account, "Deleting access token");

        self.delete_secret(&format!("{ACCESS_PREFIX}{account}"))?;
        self.delete_secret(&format!("{SECRET_PREFIX}{account}"))
    }

    /// Determine whether an access token exists for the account.
    #[must_use]
    pub fn has_tokens(&self, account: &str) -> bool {
        self.secret_exists(&format!("{ACCESS_PREFIX}{account}"))
    }
}

#[async_trait]
impl KeychainTrait for KeychainProvider {
    async fn store_tokens(&self, account: &str, tokens: &TokenPair) -> Result<(), KeychainError> {
        KeychainProvider::store_tokens(self, account, tokens)
    }

    async fn retrieve_tokens(&self, account: &str) -> Result<TokenPair, KeychainError> {
        KeychainProvider::retrieve_tokens(self, account)
    }

    async fn delete_tokens(&self, account: &str) -> Result<(), KeychainError> {
        KeychainProvider::delete_tokens(self, account)
    }

    async fn has_tokens(&self, account: &str) -> bool {
        KeychainProvider::has_tokens(self, account)
    }
}
