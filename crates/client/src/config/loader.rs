//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `.env` in the working directory is loaded into the process environment
//!    (existing variables win)
//! 2. A config file is probed; its values form the base, defaults otherwise
//! 3. Environment variables override individual fields
//!
//! Missing required settings do not fail loading.
//! `IndivoServer::ready_to_connect` reports them.
//!
//! ## Environment Variables
//! - `INDIVO_ENDPOINT_URL`: API base URL
//! - `INDIVO_UI_URL`: UI server base URL (login pages)
//! - `INDIVO_APP_ID`: application id, e.g. `problems@apps.indivo.org`
//! - `INDIVO_CONSUMER_KEY` / `INDIVO_CONSUMER_SECRET`: OAuth consumer
//!   credential
//! - `INDIVO_CALLBACK_SCHEME`: redirect scheme (default `indivo-framework`)
//! - `INDIVO_STORE_CREDENTIALS`: persist access tokens in the keychain
//!   (true/false)
//!
//! ## File Locations
//! 1. `./indivo.json` or `./indivo.toml`
//! 2. `./config.json` or `./config.toml`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use indivo_domain::{IndivoError, Result, ServerConfig};

const ENV_ENDPOINT_URL: &str = "INDIVO_ENDPOINT_URL";
const ENV_UI_URL: &str = "INDIVO_UI_URL";
const ENV_APP_ID: &str = "INDIVO_APP_ID";
const ENV_CONSUMER_KEY: &str = "INDIVO_CONSUMER_KEY";
const ENV_CONSUMER_SECRET: &str = "INDIVO_CONSUMER_SECRET";
const ENV_CALLBACK_SCHEME: &str = "INDIVO_CALLBACK_SCHEME";
const ENV_STORE_CREDENTIALS: &str = "INDIVO_STORE_CREDENTIALS";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `IndivoError::Configuration` if a probed config file exists but
/// cannot be read or parsed.
pub fn load() -> Result<ServerConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let base = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            ServerConfig::default()
        }
    };

    let config = apply_env_overrides(base);
    if let Some(field) = config.first_missing_field() {
        tracing::warn!(field, "Configuration incomplete");
    } else {
        tracing::info!(endpoint = %config.endpoint_url, app_id = %config.app_id, "Configuration loaded");
    }

    Ok(config)
}

/// Load configuration from environment variables only
///
/// Unset variables keep their defaults.
#[must_use]
pub fn load_from_env() -> ServerConfig {
    apply_env_overrides(ServerConfig::default())
}

/// Override fields of `config` with any `INDIVO_*` variables that are set
#[must_use]
pub fn apply_env_overrides(mut config: ServerConfig) -> ServerConfig {
    let overrides: [(&str, &mut String); 6] = [
        (ENV_ENDPOINT_URL, &mut config.endpoint_url),
        (ENV_UI_URL, &mut config.ui_url),
        (ENV_APP_ID, &mut config.app_id),
        (ENV_CONSUMER_KEY, &mut config.client_key),
        (ENV_CONSUMER_SECRET, &mut config.client_secret),
        (ENV_CALLBACK_SCHEME, &mut config.callback_scheme),
    ];

    for (key, field) in overrides {
        if let Some(value) = env_string(key) {
            *field = value;
        }
    }

    config.store_credentials = env_bool(ENV_STORE_CREDENTIALS, config.store_credentials);
    config
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports JSON and TOML (detected by file extension).
///
/// # Errors
/// Returns `IndivoError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ServerConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(IndivoError::Configuration(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            IndivoError::Configuration("no config file in the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        IndivoError::Configuration(format!("failed to read {}: {e}", config_path.display()))
    })?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<ServerConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| IndivoError::Configuration(format!("invalid TOML: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| IndivoError::Configuration(format!("invalid JSON: {e}"))),
        _ => Err(IndivoError::Configuration(format!("unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["indivo.json", "indivo.toml", "config.json", "config.toml"];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 7] = [
        ENV_ENDPOINT_URL,
        ENV_UI_URL,
        ENV_APP_ID,
        ENV_CONSUMER_KEY,
        ENV_CONSUMER_SECRET,
        ENV_CALLBACK_SCHEME,
        ENV_STORE_CREDENTIALS,
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("INDIVO_TEST_BOOL_YES", "YES");
        std::env::set_var("INDIVO_TEST_BOOL_OFF", "off");
        std::env::remove_var("INDIVO_TEST_BOOL_MISSING");

        assert!(env_bool("INDIVO_TEST_BOOL_YES", false));
        assert!(!env_bool("INDIVO_TEST_BOOL_OFF", true));
        assert!(env_bool("INDIVO_TEST_BOOL_MISSING", true));

        std::env::remove_var("INDIVO_TEST_BOOL_YES");
        std::env::remove_var("INDIVO_TEST_BOOL_OFF");
    }

    /// Validates `load_from_env` behavior for the all variables set scenario.
    ///
    /// Assertions:
    /// - Confirms every `INDIVO_*` variable lands in its field.
    /// - Confirms fields without a variable keep their defaults.
    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_ENDPOINT_URL, "https://indivo.example.org:8000");
        std::env::set_var(ENV_UI_URL, "https://indivo.example.org");
        std::env::set_var(ENV_APP_ID, "problems@apps.indivo.org");
        std::env::set_var(ENV_CONSUMER_KEY, "problems");
        std::env::set_var(ENV_CONSUMER_SECRET, "yourface");
        std::env::set_var(ENV_CALLBACK_SCHEME, "my-app");
        std::env::set_var(ENV_STORE_CREDENTIALS, "true");

        let config = load_from_env();
        clear_env();

        assert_eq!(config.endpoint_url, "https://indivo.example.org:8000");
        assert_eq!(config.ui_url, "https://indivo.example.org");
        assert_eq!(config.app_id, "problems@apps.indivo.org");
        assert_eq!(config.client_key, "problems");
        assert_eq!(config.client_secret, "yourface");
        assert_eq!(config.callback_scheme, "my-app");
        assert!(config.store_credentials);
        assert_eq!(config.discovery_path, "/records/");
        assert!(config.first_missing_field().is_none());
    }

    #[test]
    fn test_load_from_env_partial_is_not_an_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_ENDPOINT_URL, "https://indivo.example.org:8000");
        let config = load_from_env();
        clear_env();

        assert_eq!(config.callback_scheme, "indivo-framework");
        assert!(!config.store_credentials);
        assert_eq!(config.first_missing_field(), Some("app_id"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let base = ServerConfig::new("https://file.example.org", "", "app", "key", "secret");
        std::env::set_var(ENV_ENDPOINT_URL, "https://env.example.org");
        std::env::set_var(ENV_CONSUMER_SECRET, "   ");
        let config = apply_env_overrides(base);
        clear_env();

        assert_eq!(config.endpoint_url, "https://env.example.org");
        assert_eq!(config.client_secret, "secret");
    }

    #[test]
    fn test_parse_config_rejects_unknown_extension() {
        let result = parse_config("endpoint_url = 'x'", Path::new("indivo.yaml"));
        assert!(matches!(result, Err(IndivoError::Configuration(_))));
    }
}
