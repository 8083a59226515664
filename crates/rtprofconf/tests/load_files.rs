//! Integration tests for layered config file loading.

use std::fs;

use rtprofconf::{ConfigError, RtProfConfig};
use tempfile::TempDir;

#[test]
fn later_files_override_earlier_ones_key_by_key() {
    let dir = TempDir::new().unwrap();
    let system = dir.path().join("system.toml");
    let local = dir.path().join("local.toml");

    fs::write(
        &system,
        r#"
[profiling]
duration_ms = 2000
n_prof = 2

[render]
sample_rate = 48000
"#,
    )
    .unwrap();
    fs::write(
        &local,
        r#"
[profiling]
n_prof = 8
print_mode = 1
"#,
    )
    .unwrap();

    let (config, sources) = RtProfConfig::load_files(&[system.clone(), local.clone()]).unwrap();

    assert_eq!(config.profiling.duration_ms, 2000);
    assert_eq!(config.profiling.n_prof, 8);
    assert_eq!(config.profiling.print_mode, 1);
    assert_eq!(config.render.sample_rate, 48000);
    assert_eq!(config.render.block_size, 64);
    assert_eq!(sources.files, vec![system, local]);
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = RtProfConfig::load_files(&[missing.clone()]).unwrap_err();
    match err {
        ConfigError::FileRead { path, .. } => assert_eq!(path, missing),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn wrong_type_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[render]\nsample_rate = \"fast\"\n").unwrap();

    let err = RtProfConfig::load_files(&[path]).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn explicit_path_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[render]\nvoices = 3\n").unwrap();

    // Env overrides may apply on the test machine, so only check the file took part.
    let (_config, sources) = RtProfConfig::load_with_sources_from(Some(&path)).unwrap();
    assert!(sources.files.contains(&path));
}
