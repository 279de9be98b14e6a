//! Configuration loading and validation for the launcher
//!
//! This module parses a TOML configuration into `schema::LauncherConfig`,
//! relies on serde defaults from the schema types, and performs strict
//! validation with field-path error messages.

use crate::{CoreError, Result};
use schema::LauncherConfig;
use std::fs;
use std::path::Path;

/// Structural validation run on every load
pub fn validate(cfg: &LauncherConfig) -> Result<()> {
    non_empty("confDir", &cfg.conf_dir)?;
    non_empty("mainClass", &cfg.main_class)?;
    non_empty("libDir", &cfg.lib_dir)?;
    non_empty("pidDir", &cfg.pid_dir)?;
    non_empty("pidFileName", &cfg.pid_file_name)?;
    non_empty("exitCodeFileName", &cfg.exit_code_file_name)?;
    non_empty("outFile", &cfg.out_file)?;
    non_empty("logFile", &cfg.log_file)?;

    if cfg.pid_file_name == cfg.exit_code_file_name {
        return Err(CoreError::ValidationError(
            "exitCodeFileName: must differ from pidFileName".to_string(),
        ));
    }

    if let Some(user) = &cfg.run_as_user {
        non_empty("runAsUser", user)?;
    }
    if let Some(pattern) = &cfg.search_pattern {
        non_empty("searchPattern", pattern)?;
    }
    for (i, entry) in cfg.extra_classpath.iter().enumerate() {
        non_empty(&format!("extraClasspath[{}]", i), entry)?;
    }
    for (i, shell) in cfg.shell_whitelist.iter().enumerate() {
        non_empty(&format!("shellWhitelist[{}]", i), shell)?;
    }

    // security
    if let Some(loc) = &cfg.security.master_key_location {
        non_empty("security.masterKeyLocation", loc)?;
    }

    // database
    if cfg.database.port == Some(0) {
        return Err(CoreError::ValidationError(
            "database.port: must be 1..=65535".to_string(),
        ));
    }
    if cfg.database.port.is_some() != cfg.database.host.is_some() {
        return Err(CoreError::ValidationError(
            "database.host: host and port must be configured together".to_string(),
        ));
    }

    // readiness
    let r = &cfg.readiness;
    if r.poll_interval_ms == 0 {
        return Err(CoreError::ValidationError(
            "readiness.pollIntervalMs: must be > 0".to_string(),
        ));
    }
    if r.ping_attempts == 0 {
        return Err(CoreError::ValidationError(
            "readiness.pingAttempts: must be > 0".to_string(),
        ));
    }
    if r.ping_timeout_secs == 0 {
        return Err(CoreError::ValidationError(
            "readiness.pingTimeoutSecs: must be > 0".to_string(),
        ));
    }
    non_empty("readiness.pingUrl", &r.ping_url)?;

    Ok(())
}

/// Keys the server cannot start without.
///
/// Checked by the supervisor before any identity or runtime resolution.
pub fn check_required_properties(cfg: &LauncherConfig) -> Result<()> {
    match cfg.database.name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(CoreError::ConfigurationError(
            "database.name: the database name property is not set. \
             Please run setup before starting the server"
                .to_string(),
        )),
    }
}

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!(
            "{}: cannot be empty",
            field
        )));
    }
    Ok(())
}

/// Load the launcher config from a TOML file path
pub fn load_launcher_config_from_path(path: impl AsRef<Path>) -> Result<LauncherConfig> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_launcher_config_from_str(&data)
}

/// Load the launcher config from a TOML string
pub fn load_launcher_config_from_str(input: &str) -> Result<LauncherConfig> {
    let cfg: LauncherConfig = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> String {
        r#"
        runAsUser = "ignition"
        confDir = "/etc/ignition/conf"
        mainClass = "org.example.server.Main"

        [security]
        encryptionEnabled = true
        masterKeyLocation = "/var/lib/ignition/keys"

        [database]
        name = "serverdb"
        host = "db.example.com"
        port = 5432

        [readiness]
        discoveryWindowSecs = 3
        "#
        .to_string()
    }

    #[test]
    fn parses_and_validates_valid_config() {
        let cfg = load_launcher_config_from_str(&valid_config()).expect("should parse");
        assert_eq!(cfg.run_as_user.as_deref(), Some("ignition"));
        assert!(cfg.security.encryption_enabled);
        assert_eq!(cfg.database.port, Some(5432));
        assert_eq!(cfg.readiness.discovery_window_secs, 3);
        assert_eq!(cfg.readiness.startup_window_secs, 10);
        assert!(check_required_properties(&cfg).is_ok());
    }

    #[test]
    fn errors_on_missing_main_class() {
        let err = load_launcher_config_from_str(r#"confDir = "/etc/conf""#).unwrap_err();
        assert!(format!("{}", err).contains("mainClass: cannot be empty"));
    }

    #[test]
    fn errors_on_zero_database_port() {
        let input = r#"
        confDir = "/etc/conf"
        mainClass = "a.B"
        [database]
        host = "localhost"
        port = 0
        "#;
        let err = load_launcher_config_from_str(input).unwrap_err();
        assert!(format!("{}", err).contains("database.port"));
    }

    #[test]
    fn errors_on_host_without_port() {
        let input = r#"
        confDir = "/etc/conf"
        mainClass = "a.B"
        [database]
        host = "localhost"
        "#;
        let err = load_launcher_config_from_str(input).unwrap_err();
        assert!(format!("{}", err).contains("database.host"));
    }

    #[test]
    fn errors_on_zero_poll_interval() {
        let input = r#"
        confDir = "/etc/conf"
        mainClass = "a.B"
        [readiness]
        pollIntervalMs = 0
        "#;
        let err = load_launcher_config_from_str(input).unwrap_err();
        assert!(format!("{}", err).contains("readiness.pollIntervalMs"));
    }

    #[test]
    fn missing_database_name_is_a_configuration_error() {
        let cfg = load_launcher_config_from_str(
            r#"
            confDir = "/etc/conf"
            mainClass = "a.B"
            "#,
        )
        .unwrap();
        let err = check_required_properties(&cfg).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
        assert!(err.to_string().contains("database.name"));
    }

    #[test]
    fn reports_toml_parse_errors() {
        let err = load_launcher_config_from_str("confDir = ").unwrap_err();
        assert!(format!("{}", err).contains("TOML parse error"));
    }

    #[test]
    fn unreadable_path_is_a_configuration_error() {
        let err = load_launcher_config_from_path("/nonexistent/ignition.toml").unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }
}
