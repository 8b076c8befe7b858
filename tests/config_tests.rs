// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Config file loading, bootstrap and persistence.

use fleet_registry::config::{AppConfig, ConfigError, ConfigLoader};
use std::fs;

#[test]
fn test_missing_file_bootstraps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let loader = ConfigLoader::new(&path);
    let config = loader.load().expect("missing file is not an error");

    assert_eq!(config, AppConfig::default());
    assert_eq!(config.port, ":443");
    assert!(path.exists(), "defaults should be written out");

    let written: AppConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, AppConfig::default());
}

#[test]
fn test_partial_file_merges_onto_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"port": "", "database": {"uri": "mongodb://x"}}"#).unwrap();

    let loader = ConfigLoader::new(&path);
    let config = loader.load().unwrap();

    assert_eq!(config.port, ":443");
    assert_eq!(config.database.uri, "mongodb://x");
    assert_eq!(loader.current(), config);
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"port": ":8443", "database": {"uri": "memory://", "name": "fleet", "timeout_secs": 5}}"#,
    )
    .unwrap();

    let loader = ConfigLoader::new(&path);
    let loaded = loader.load().unwrap();
    loader.save().unwrap();

    let reloaded = ConfigLoader::new(&path).load().unwrap();
    assert_eq!(reloaded, loaded);
    assert_eq!(reloaded.port, ":8443");
    assert_eq!(reloaded.database.name, "fleet");
    assert_eq!(reloaded.database.timeout_secs, 5);
}

#[test]
fn test_save_writes_defaults_without_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    ConfigLoader::new(&path).save().unwrap();

    let reloaded = ConfigLoader::new(&path).load().unwrap();
    assert_eq!(reloaded, AppConfig::default());
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ port: 443 ").unwrap();

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");

    // The file is left alone
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ port: 443 ");
}

#[test]
fn test_wrong_field_type_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"port": 443}"#).unwrap();

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_unreadable_path_is_read_error() {
    let dir = tempfile::tempdir().unwrap();

    // A directory cannot be read as a file
    let err = ConfigLoader::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }), "got {err:?}");
}

#[test]
fn test_unwritable_bootstrap_is_write_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("config.json");

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, ConfigError::Write { .. }), "got {err:?}");
}

#[test]
fn test_concurrent_load_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"database": {"uri": "memory://"}}"#).unwrap();

    let loader = std::sync::Arc::new(ConfigLoader::new(&path));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let loader = loader.clone();
            std::thread::spawn(move || {
                if i % 2 == 0 {
                    loader.load().map(|_| ())
                } else {
                    loader.save()
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let config = loader.current();
    assert!(
        config == AppConfig::default() || config.database.uri == "memory://",
        "never a partially merged config"
    );
    assert_eq!(config.port, ":443");
}
