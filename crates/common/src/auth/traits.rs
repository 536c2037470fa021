//! Storage seam for persisted access tokens
//!
//! Abstracts the platform keychain so the credential store can be exercised
//! against an in-memory double.

use async_trait::async_trait;

use super::types::TokenPair;
use crate::security::KeychainError;

/// Trait for keychain operations
#[async_trait]
pub trait KeychainTrait: Send + Sync {
    /// Store the access token pair for `account`
    ///
    /// # Errors
    /// Returns error if storage fails
    async fn store_tokens(&self, account: &str, tokens: &TokenPair) -> Result<(), KeychainError>;

    /// Retrieve the access token pair for `account`
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if nothing is stored, other variants
    /// if the keychain cannot be read
    async fn retrieve_tokens(&self, account: &str) -> Result<TokenPair, KeychainError>;

    /// Delete the stored pair (idempotent)
    ///
    /// # Errors
    /// Returns error if deletion fails
    async fn delete_tokens(&self, account: &str) -> Result<(), KeychainError>;

    /// Check whether a pair is stored for `account`
    async fn has_tokens(&self, account: &str) -> bool;
}
