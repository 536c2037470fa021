//! Server configuration
//!
//! Everything the embedding application supplies about the remote server
//! and its own registration there. Values may be left empty when loading;
//! `first_missing_field` reports what is still required before connecting.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CALLBACK_SCHEME, DEFAULT_DISCOVERY_PATH, DEFAULT_KEYCHAIN_SERVICE,
    DEFAULT_LOGIN_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Configuration for one remote Indivo server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the API server (e.g. `https://indivo.example.org:8000`)
    #[serde(default)]
    pub endpoint_url: String,

    /// Base URL of the UI server hosting the authorize page
    #[serde(default)]
    pub ui_url: String,

    /// Id of the app as registered on the server
    #[serde(default)]
    pub app_id: String,

    /// OAuth consumer key
    #[serde(default, alias = "consumer_key")]
    pub client_key: String,

    /// OAuth consumer secret
    #[serde(default, alias = "consumer_secret")]
    pub client_secret: String,

    /// Scheme of the redirect URL, `{callback_scheme}://{app_id}`
    #[serde(default = "default_callback_scheme")]
    pub callback_scheme: String,

    /// Persist the access credential in the platform keychain
    #[serde(default)]
    pub store_credentials: bool,

    /// Path of the record discovery call, relative to `endpoint_url`
    #[serde(default = "default_discovery_path")]
    pub discovery_path: String,

    /// How long to wait for the user on the login surface
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Per-request transport timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Keychain service name used when `store_credentials` is on
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
}

fn default_callback_scheme() -> String {
    DEFAULT_CALLBACK_SCHEME.to_string()
}

fn default_discovery_path() -> String {
    DEFAULT_DISCOVERY_PATH.to_string()
}

fn default_login_timeout() -> u64 {
    DEFAULT_LOGIN_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            ui_url: String::new(),
            app_id: String::new(),
            client_key: String::new(),
            client_secret: String::new(),
            callback_scheme: default_callback_scheme(),
            store_credentials: false,
            discovery_path: default_discovery_path(),
            login_timeout_secs: default_login_timeout(),
            request_timeout_secs: default_request_timeout(),
            keychain_service: default_keychain_service(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the required settings and defaults for
    /// the rest
    #[must_use]
    pub fn new(
        endpoint_url: impl Into<String>,
        ui_url: impl Into<String>,
        app_id: impl Into<String>,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ui_url: ui_url.into(),
            app_id: app_id.into(),
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_callback_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.callback_scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn with_store_credentials(mut self, store: bool) -> Self {
        self.store_credentials = store;
        self
    }

    #[must_use]
    pub fn with_discovery_path(mut self, path: impl Into<String>) -> Self {
        self.discovery_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_timeout_secs(mut self, secs: u64) -> Self {
        self.login_timeout_secs = secs;
        self
    }

    /// First required field that is empty, in the order `endpoint_url`,
    /// `app_id`, `client_key`, `client_secret`
    #[must_use]
    pub fn first_missing_field(&self) -> Option<&'static str> {
        [
            ("endpoint_url", &self.endpoint_url),
            ("app_id", &self.app_id),
            ("client_key", &self.client_key),
            ("client_secret", &self.client_secret),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Redirect URL the server sends the user back to after approval
    #[must_use]
    pub fn authorize_callback_url(&self) -> String {
        format!("{}://{}", self.callback_scheme, self.app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ServerConfig {
        ServerConfig::new(
            "https://indivo.example.org:8000",
            "https://indivo.example.org",
            "problems@apps.indivo.org",
            "key",
            "secret",
        )
    }

    #[test]
    fn defaults_are_applied() {
        let config = complete();
        assert_eq!(config.callback_scheme, "indivo-framework");
        assert!(!config.store_credentials);
        assert_eq!(config.discovery_path, "/records/");
    }

    #[test]
    fn reports_first_missing_field_in_order() {
        assert_eq!(complete().first_missing_field(), None);

        let mut config = complete();
        config.client_secret.clear();
        assert_eq!(config.first_missing_field(), Some("client_secret"));

        config.app_id = "   ".to_string();
        assert_eq!(config.first_missing_field(), Some("app_id"));

        assert_eq!(ServerConfig::default().first_missing_field(), Some("endpoint_url"));
    }

    #[test]
    fn ui_url_is_not_required() {
        let mut config = complete();
        config.ui_url.clear();
        assert_eq!(config.first_missing_field(), None);
    }

    #[test]
    fn callback_url_uses_scheme_and_app_id() {
        let config = complete().with_callback_scheme("myapp");
        assert_eq!(config.authorize_callback_url(), "myapp://problems@apps.indivo.org");
    }

    #[test]
    fn deserializes_with_aliases_and_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
endpoint_url = "https://indivo.example.org:8000"
app_id = "app"
consumer_key = "ck"
consumer_secret = "cs"
store_credentials = true
"#,
        )
        .unwrap();

        assert_eq!(config.client_key, "ck");
        assert_eq!(config.client_secret, "cs");
        assert!(config.store_credentials);
        assert_eq!(config.callback_scheme, "indivo-framework");
        assert_eq!(config.login_timeout_secs, 600);
    }
}
