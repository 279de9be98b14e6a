//! Loading configuration files through the CLI entry points

use cli::{load_config, running_pid, CliError};
use std::path::PathBuf;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("workspace root")
        .join("conf")
        .join("ignition.toml")
}

#[test]
fn shipped_config_is_valid() {
    let config = load_config(&shipped_config()).unwrap();
    assert_eq!(config.run_as_user.as_deref(), Some("ignition"));
    assert_eq!(config.database.name.as_deref(), Some("ignition"));
    assert_eq!(config.readiness.ping_attempts, 4);
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CliError::ConfigError(_)));
    assert_eq!(err.code(), "CLI001");
}

#[test]
fn status_without_pid_file_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ignition.toml");
    std::fs::write(
        &path,
        format!(
            "confDir = \"/etc/ignition/conf\"\nmainClass = \"org.example.Main\"\npidDir = '{}'\n",
            dir.path().display()
        ),
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    assert!(matches!(running_pid(&config), Err(CliError::NotRunning)));
}
