//! Credential types shared by the handshake and the credential store

use std::fmt;

use indivo_domain::constants::{OAUTH_PROBLEM, OAUTH_TOKEN, OAUTH_TOKEN_SECRET, XOAUTH_RECORD_ID};
use indivo_domain::IndivoError;
use serde::{Deserialize, Serialize};

use super::oauth1::OAuthSigner;

/// Token and its secret as issued by the server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { token: token.into(), secret: secret.into() }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Consumer credential plus whatever the handshake has issued so far
///
/// Only the session manager builds and mutates these. Calls get an
/// [`OAuthSigner`] through [`Credential::signer`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    consumer_token: String,
    consumer_secret: String,
    access: Option<TokenPair>,
    verifier: Option<String>,
}

impl Credential {
    /// Consumer credential without any issued token
    #[must_use]
    pub fn consumer(consumer_token: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_token: consumer_token.into(),
            consumer_secret: consumer_secret.into(),
            access: None,
            verifier: None,
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: TokenPair) -> Self {
        self.access = Some(access);
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    #[must_use]
    pub fn consumer_token(&self) -> &str {
        &self.consumer_token
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access.as_ref().map(|a| a.token.as_str())
    }

    #[must_use]
    pub fn access_token_secret(&self) -> Option<&str> {
        self.access.as_ref().map(|a| a.secret.as_str())
    }

    #[must_use]
    pub fn access(&self) -> Option<&TokenPair> {
        self.access.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    /// Whether an access token has been issued
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.access.is_some()
    }

    /// Drop the access token, keeping the consumer credential
    pub fn revoke_access(&mut self) {
        self.access = None;
        self.verifier = None;
    }

    /// Signer carrying the consumer credential and the access token, if any
    #[must_use]
    pub fn signer(&self) -> OAuthSigner {
        let signer = OAuthSigner::consumer_only(&self.consumer_token, &self.consumer_secret);
        match &self.access {
            Some(access) => signer.with_token(access.clone()),
            None => signer,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("consumer_token", &self.consumer_token)
            .field("access_token", &self.access_token())
            .field("has_verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

/// Form-encoded body of `request_token` / `access_token` responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: TokenPair,
    /// `xoauth_indivo_record_id`, sent by the access-token exchange when the
    /// user picked a record during approval
    pub record_id: Option<String>,
}

impl TokenResponse {
    /// Parse `oauth_token=..&oauth_token_secret=..[&xoauth_indivo_record_id=..]`
    ///
    /// # Errors
    /// - `IndivoError::Authentication` when the server reports an
    ///   `oauth_problem`
    /// - `IndivoError::InvalidResponse` when the token or secret is missing
    pub fn parse(body: &str) -> Result<Self, IndivoError> {
        let mut token = None;
        let mut secret = None;
        let mut record_id = None;
        let mut problem = None;

        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                OAUTH_TOKEN => token = Some(value.into_owned()),
                OAUTH_TOKEN_SECRET => secret = Some(value.into_owned()),
                XOAUTH_RECORD_ID if !value.is_empty() => record_id = Some(value.into_owned()),
                OAUTH_PROBLEM => problem = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(problem) = problem {
            return Err(IndivoError::Authentication(format!("Server reported {problem}")));
        }

        match (token, secret) {
            (Some(token), Some(secret)) if !token.is_empty() => {
                Ok(Self { token: TokenPair { token, secret }, record_id })
            }
            _ => Err(IndivoError::InvalidResponse(
                "Token response is missing oauth_token or oauth_token_secret".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates `TokenResponse::parse` behavior for the access token with
    /// record id scenario.
    ///
    /// Assertions:
    /// - Confirms token, secret and record id are decoded.
    #[test]
    fn parses_access_token_with_record_id() {
        let body = "oauth_token=tok&oauth_token_secret=s%2Fcret&xoauth_indivo_record_id=rec-1";
        let parsed = TokenResponse::parse(body).unwrap();

        assert_eq!(parsed.token, TokenPair::new("tok", "s/cret"));
        assert_eq!(parsed.record_id.as_deref(), Some("rec-1"));
    }

    #[test]
    fn missing_secret_is_invalid_response() {
        let result = TokenResponse::parse("oauth_token=tok");
        assert!(matches!(result, Err(IndivoError::InvalidResponse(_))));
    }

    #[test]
    fn oauth_problem_is_authentication_error() {
        let result = TokenResponse::parse("oauth_problem=token_rejected");
        match result {
            Err(IndivoError::Authentication(msg)) => assert!(msg.contains("token_rejected")),
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Validates `Credential::signer` behavior for the consumer and access
    /// token scenarios.
    ///
    /// Assertions:
    /// - Ensures consumer-only credentials produce a signer without token.
    /// - Ensures `revoke_access` removes the token again.
    #[test]
    fn signer_follows_access_token() {
        let consumer = Credential::consumer("key", "secret");
        assert!(!consumer.signer().has_token());

        let mut authorized = consumer.with_access(TokenPair::new("tok", "tok-secret"));
        assert!(authorized.is_authorized());
        assert_eq!(authorized.signer().token(), Some("tok"));
        assert_eq!(authorized.access_token_secret(), Some("tok-secret"));

        authorized.revoke_access();
        assert!(!authorized.is_authorized());
        assert!(!authorized.signer().has_token());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::consumer("key", "consumer-secret")
            .with_access(TokenPair::new("tok", "access-secret"))
            .with_verifier("verifier-123");
        let rendered = format!("{credential:?}");

        assert!(rendered.contains("tok"));
        assert!(!rendered.contains("consumer-secret"));
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("verifier-123"));
        assert!(!format!("{:?}", TokenPair::new("t", "hidden")).contains("hidden"));
    }
}
