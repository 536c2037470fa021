//! Config file loading against real files on disk

use std::io::Write;

use indivo_client::config::load_from_file;
use indivo_domain::IndivoError;
use tempfile::{Builder, TempDir};

fn write_config(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create config file");
    file.write_all(contents.as_bytes()).expect("write config file");
    path
}

#[test]
fn loads_json_with_defaults_for_optional_fields() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "indivo.json",
        r#"{
            "endpoint_url": "https://indivo.example.org:8000",
            "ui_url": "https://indivo.example.org",
            "app_id": "problems@apps.indivo.org",
            "consumer_key": "problems",
            "consumer_secret": "yourface"
        }"#,
    );

    let config = load_from_file(Some(path)).expect("load json");

    assert_eq!(config.client_key, "problems");
    assert_eq!(config.client_secret, "yourface");
    assert_eq!(config.callback_scheme, "indivo-framework");
    assert!(!config.store_credentials);
    assert_eq!(config.discovery_path, "/records/");
    assert_eq!(config.authorize_callback_url(), "indivo-framework://problems@apps.indivo.org");
    assert!(config.first_missing_field().is_none());
}

#[test]
fn loads_toml() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "indivo.toml",
        r#"
endpoint_url = "https://indivo.example.org:8000"
app_id = "problems@apps.indivo.org"
client_key = "problems"
client_secret = "yourface"
callback_scheme = "problems-app"
store_credentials = true
login_timeout_secs = 120
"#,
    );

    let config = load_from_file(Some(path)).expect("load toml");

    assert_eq!(config.ui_url, "");
    assert_eq!(config.callback_scheme, "problems-app");
    assert!(config.store_credentials);
    assert_eq!(config.login_timeout_secs, 120);
}

#[test]
fn incomplete_file_still_loads() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "config.json", r#"{ "endpoint_url": "https://indivo.example.org" }"#);

    let config = load_from_file(Some(path)).expect("load partial json");
    assert_eq!(config.first_missing_field(), Some("app_id"));
}

#[test]
fn invalid_or_missing_files_are_configuration_errors() {
    let dir = TempDir::new().expect("temp dir");

    let broken = write_config(&dir, "indivo.json", "{ not json");
    assert!(matches!(load_from_file(Some(broken)), Err(IndivoError::Configuration(_))));

    let yaml = Builder::new().suffix(".yaml").tempfile_in(dir.path()).expect("temp yaml");
    assert!(matches!(
        load_from_file(Some(yaml.path().to_path_buf())),
        Err(IndivoError::Configuration(_))
    ));

    let missing = dir.path().join("absent.toml");
    assert!(matches!(load_from_file(Some(missing)), Err(IndivoError::Configuration(_))));
}
