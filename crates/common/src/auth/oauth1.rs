//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1)
//!
//! Builds the signature base string from the request method, the base string
//! URI and the normalized parameters (query, form body and `oauth_*`
//! protocol parameters), signs it with `consumer_secret&token_secret` and
//! renders the `Authorization: OAuth ...` header.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use indivo_domain::IndivoError;
use rand::Rng;
use sha1::Sha1;
use url::Url;

use super::types::TokenPair;

type HmacSha1 = Hmac<Sha1>;

/// Signature method advertised in `oauth_signature_method`
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Protocol version advertised in `oauth_version`
pub const OAUTH_VERSION: &str = "1.0";

/// Percent-encode per RFC 3986 (everything but `A-Z a-z 0-9 - . _ ~`)
#[must_use]
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Generate a random nonce for `oauth_nonce`
///
/// 16 random bytes, URL-safe base64 without padding (22 characters).
#[must_use]
pub fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Scheme, host, non-default port and path of `url`, without query or
/// fragment
#[must_use]
pub fn base_string_uri(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

/// Encode, sort and join request parameters
#[must_use]
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> =
        params.iter().map(|(k, v)| (percent_encode(k), percent_encode(v))).collect();
    encoded.sort();

    encoded.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}

/// Signature base string for a request
///
/// `params` holds the form body and protocol parameters; query parameters
/// are taken from `url`.
#[must_use]
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut all: Vec<(String, String)> =
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    all.extend(params.iter().cloned());

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_string_uri(url)),
        percent_encode(&normalize_parameters(&all))
    )
}

/// Base64 HMAC-SHA1 of `text` under `key`
///
/// # Errors
/// Returns `IndivoError::Authentication` if the MAC cannot be keyed
pub fn hmac_sha1_base64(key: &str, text: &str) -> Result<String, IndivoError> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| IndivoError::Authentication(format!("Invalid signing key: {e}")))?;
    mac.update(text.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signing capability handed to server calls
///
/// Carries the consumer credential and, once issued, a request or access
/// token. Secrets never leave this type except inside a signature.
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: Option<TokenPair>,
}

impl OAuthSigner {
    /// Two-legged signer (consumer credential only)
    #[must_use]
    pub fn consumer_only(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self { consumer_key: consumer_key.into(), consumer_secret: consumer_secret.into(), token: None }
    }

    /// Add a request or access token
    #[must_use]
    pub fn with_token(mut self, token: TokenPair) -> Self {
        self.token = Some(token);
        self
    }

    /// Whether a token is attached
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Public half of the attached token
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|pair| pair.token.as_str())
    }

    /// Render an `Authorization` header for the request
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Full request URL including query
    /// * `body_params` - Form-encoded body parameters (empty for other bodies)
    /// * `extra_oauth` - Additional protocol parameters such as
    ///   `oauth_callback` or `oauth_verifier`
    ///
    /// # Errors
    /// Returns `IndivoError::Authentication` if signing fails
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        body_params: &[(String, String)],
        extra_oauth: &[(String, String)],
    ) -> Result<String, IndivoError> {
        self.authorization_header_with(
            method,
            url,
            body_params,
            extra_oauth,
            &generate_nonce(),
            Utc::now().timestamp(),
        )
    }

    /// Same as [`Self::authorization_header`] with a fixed nonce and
    /// timestamp
    ///
    /// # Errors
    /// Returns `IndivoError::Authentication` if signing fails
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        body_params: &[(String, String)],
        extra_oauth: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, IndivoError> {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = &self.token {
            oauth.push(("oauth_token".to_string(), token.token.clone()));
        }
        oauth.extend(extra_oauth.iter().cloned());

        let mut signed_params = oauth.clone();
        signed_params.extend(body_params.iter().cloned());

        let base = signature_base_string(method, url, &signed_params);
        let signature = hmac_sha1_base64(&self.signing_key(), &base)?;
        oauth.push(("oauth_signature".to_string(), signature));

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {fields}"))
    }

    fn signing_key(&self) -> String {
        let token_secret = self.token.as_ref().map(|t| t.secret.as_str()).unwrap_or("");
        format!("{}&{}", percent_encode(&self.consumer_secret), percent_encode(token_secret))
    }
}

impl std::fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}
