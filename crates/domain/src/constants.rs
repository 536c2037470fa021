//! Protocol constants
//!
//! Endpoint paths, OAuth parameter names and configuration defaults used by
//! the session layer.

// Configuration defaults
pub const DEFAULT_CALLBACK_SCHEME: &str = "indivo-framework";
pub const DEFAULT_DISCOVERY_PATH: &str = "/records/";
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Indivo.oauth";

// OAuth 1.0a endpoints (relative to the server / UI base URLs)
pub const REQUEST_TOKEN_PATH: &str = "/oauth/request_token";
pub const ACCESS_TOKEN_PATH: &str = "/oauth/access_token";
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

// OAuth 1.0a parameter names
pub const OAUTH_TOKEN: &str = "oauth_token";
pub const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
pub const OAUTH_VERIFIER: &str = "oauth_verifier";
pub const OAUTH_CALLBACK: &str = "oauth_callback";
pub const OAUTH_PROBLEM: &str = "oauth_problem";

/// Record id the server attaches to the access token response when the user
/// picked a record on the authorize page.
pub const XOAUTH_RECORD_ID: &str = "xoauth_indivo_record_id";
