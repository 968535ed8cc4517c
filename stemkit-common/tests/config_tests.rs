//! Configuration loading and graceful degradation
//!
//! Covers:
//! - Missing or unparsable TOML never aborts loading
//! - Root folder priority: CLI > environment > TOML > platform default
//! - Contract environment overrides
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Every
//! test that touches STEMKIT_* variables is marked #[serial].

use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use stemkit_common::config::{
    resolve_root_folder, EngineConfig, CONFIG_FILE_ENV, MODEL_ID_ENV, PROVIDER_VERSION_ENV,
    ROOT_FOLDER_ENV, SAMPLE_RATE_ENV, VOICE_ID_ENV,
};
use tempfile::TempDir;

fn clear_env() {
    for var in [
        ROOT_FOLDER_ENV,
        CONFIG_FILE_ENV,
        VOICE_ID_ENV,
        MODEL_ID_ENV,
        SAMPLE_RATE_ENV,
        PROVIDER_VERSION_ENV,
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();

    let config = EngineConfig::load(Some(&dir.path().join("absent.toml")));
    assert_eq!(config, EngineConfig::default());
}

#[test]
#[serial]
fn test_unparsable_config_file_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is [not toml").unwrap();

    let config = EngineConfig::load(Some(&path));
    assert_eq!(config, EngineConfig::default());
}

#[test]
#[serial]
fn test_config_file_from_environment() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stemkit.toml");
    fs::write(&path, "workers = 8\nretries = 5\n").unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = EngineConfig::load(None);
    assert_eq!(config.workers, 8);
    assert_eq!(config.retries, 5);

    clear_env();
}

#[test]
#[serial]
fn test_contract_env_overrides() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[contract]\nvoice_id = \"from-file\"\n").unwrap();

    env::set_var(VOICE_ID_ENV, "from-env");
    env::set_var(SAMPLE_RATE_ENV, "44100");
    env::set_var(PROVIDER_VERSION_ENV, "2026-01-01");

    let config = EngineConfig::load(Some(&path));
    assert_eq!(config.contract.voice_id, "from-env");
    assert_eq!(config.contract.sample_rate, 44_100);
    assert_eq!(config.contract.provider_version, "2026-01-01");
    assert_eq!(config.contract.model_id, "sonic-3");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_sample_rate_override_is_ignored() {
    clear_env();
    env::set_var(SAMPLE_RATE_ENV, "fast");

    let mut config = EngineConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.contract.sample_rate, 48_000);

    clear_env();
}

#[test]
#[serial]
fn test_root_folder_cli_has_highest_priority() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = EngineConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..EngineConfig::default()
    };

    let root = resolve_root_folder(Some(Path::new("/from/cli")), &config);
    assert_eq!(root, PathBuf::from("/from/cli"));

    clear_env();
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = EngineConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..EngineConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    clear_env();
}

#[test]
#[serial]
fn test_root_folder_toml_beats_default() {
    clear_env();
    let config = EngineConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..EngineConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_root_folder_default_is_non_empty() {
    clear_env();
    let root = resolve_root_folder(None, &EngineConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("stemkit"));
}
