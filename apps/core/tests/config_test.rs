use std::path::PathBuf;
use std::time::Duration;

use unisearch_core::config::{self, Config, ConfigError};

#[test]
fn defaults_are_valid() {
    let cfg = Config::default();
    config::validate(&cfg).unwrap();
    assert_eq!(cfg.min_key_length, 2);
    assert_eq!(cfg.search_timeout(), None);
    assert_eq!(cfg.service_name, "unisearch");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn save_then_load_keeps_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("unisearch.toml");
    let cfg = Config {
        index_db_path: PathBuf::from("/var/lib/unisearch/index.sqlite3"),
        stored_list_paths: vec![PathBuf::from("/etc/unisearch/lists")],
        search_timeout_ms: 250,
        default_language: "ko".into(),
        ..Config::default()
    };

    config::save(&cfg, &path).unwrap();
    let loaded = config::load(&path).unwrap();

    assert_eq!(loaded, cfg);
    assert_eq!(loaded.search_timeout(), Some(Duration::from_millis(250)));
}

#[test]
fn partial_toml_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unisearch.toml");
    std::fs::write(&path, "min_key_length = 3\nsettings_service = \"system-settings\"\n").unwrap();

    let cfg = config::load(&path).unwrap();

    assert_eq!(cfg.min_key_length, 3);
    assert_eq!(cfg.settings_service, "system-settings");
    assert_eq!(cfg.app_manager_service, "app-manager");
}

#[test]
fn json5_config_accepts_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unisearch.json5");
    std::fs::write(
        &path,
        "{\n  // media lookups give up after a second\n  search_timeout_ms: 1000,\n  service_name: 'search',\n}\n",
    )
    .unwrap();

    let cfg = config::load(&path).unwrap();

    assert_eq!(cfg.search_timeout_ms, 1000);
    assert_eq!(cfg.service_name, "search");
}

#[test]
fn out_of_range_values_are_rejected() {
    let invalid = [
        Config {
            min_key_length: 0,
            ..Config::default()
        },
        Config {
            search_timeout_ms: 60_001,
            ..Config::default()
        },
        Config {
            default_language: " ".into(),
            ..Config::default()
        },
        Config {
            media_catalog_service: "media/catalog".into(),
            ..Config::default()
        },
        Config {
            index_db_path: PathBuf::new(),
            ..Config::default()
        },
    ];
    for cfg in invalid {
        assert!(matches!(config::validate(&cfg), Err(ConfigError::Invalid(_))));
    }
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unisearch.toml");
    std::fs::write(&path, "min_key_length = \"two\"").unwrap();

    assert!(matches!(config::load(&path), Err(ConfigError::Toml(_))));
}
