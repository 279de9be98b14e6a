//! Launcher configuration file types
//!
//! The configuration is written in TOML with camelCase keys. Every field has a
//! serde default so a minimal file only needs `confDir`, `mainClass`, and
//! `database.name`; validation of required keys happens in the core crate so
//! errors can carry field paths.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    /// Identity the server must run as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<String>,

    /// JDK installation directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_home: Option<String>,

    /// Directory scanned for JDK installations when `javaHome` is not usable
    #[serde(default = "default_jdk_install_dir")]
    pub jdk_install_dir: String,

    /// Server configuration directory, first classpath entry
    #[serde(default)]
    pub conf_dir: String,

    /// Directory holding the server jars
    #[serde(default = "default_lib_dir")]
    pub lib_dir: String,

    /// Additional classpath entries appended after the library directory
    #[serde(default)]
    pub extra_classpath: Vec<String>,

    /// Fully-qualified main class of the server
    #[serde(default)]
    pub main_class: String,

    /// Command-line fragment identifying the server in the process table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_pattern: Option<String>,

    /// Directory holding the PID and exit-code files
    #[serde(default = "default_pid_dir")]
    pub pid_dir: String,

    /// PID file name inside `pidDir`
    #[serde(default = "default_pid_file_name")]
    pub pid_file_name: String,

    /// Exit-code file name inside `pidDir`
    #[serde(default = "default_exit_code_file_name")]
    pub exit_code_file_name: String,

    /// Combined stdout/stderr of the server process
    #[serde(default = "default_out_file")]
    pub out_file: String,

    /// The server's own log file
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Heap and other JVM arguments
    #[serde(default = "default_jvm_args")]
    pub jvm_args: String,

    /// Open file descriptor ceiling; values <= 0 use the default
    #[serde(default = "default_open_files_limit")]
    pub open_files_limit: i64,

    /// JDWP port used in debug mode
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Executables allowed to own the server process (daemonizing shells)
    #[serde(default = "default_shell_whitelist")]
    pub shell_whitelist: Vec<String>,

    /// Master key and encryption settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Backing database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Readiness polling settings
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

impl LauncherConfig {
    /// Pattern used to find the server in the process table
    pub fn effective_search_pattern(&self) -> &str {
        self.search_pattern.as_deref().unwrap_or(&self.main_class)
    }

    /// Open file ceiling with non-positive values mapped to the default
    pub fn effective_open_files_limit(&self) -> u64 {
        if self.open_files_limit > 0 {
            self.open_files_limit as u64
        } else {
            DEFAULT_OPEN_FILES_LIMIT
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            run_as_user: None,
            java_home: None,
            jdk_install_dir: default_jdk_install_dir(),
            conf_dir: String::new(),
            lib_dir: default_lib_dir(),
            extra_classpath: Vec::new(),
            main_class: String::new(),
            search_pattern: None,
            pid_dir: default_pid_dir(),
            pid_file_name: default_pid_file_name(),
            exit_code_file_name: default_exit_code_file_name(),
            out_file: default_out_file(),
            log_file: default_log_file(),
            jvm_args: default_jvm_args(),
            open_files_limit: default_open_files_limit(),
            debug_port: default_debug_port(),
            shell_whitelist: default_shell_whitelist(),
            security: SecurityConfig::default(),
            database: DatabaseConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

/// Master key and encryption settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Whether stored passwords are encrypted with a master key
    #[serde(default)]
    pub encryption_enabled: bool,
    /// Directory where a persisted master key (`master`) lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_location: Option<String>,
}

/// Backing database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Database name, required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Database host used for the reachability check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Database port used for the reachability check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// JDBC driver jar, appended to the classpath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_path: Option<String>,
}

/// Readiness polling settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    /// How long to scan the process table for the spawned server
    #[serde(default = "default_discovery_window_secs")]
    pub discovery_window_secs: u64,
    /// How long to wait for a discovered process to be confirmed alive
    #[serde(default = "default_startup_window_secs")]
    pub startup_window_secs: u64,
    /// Pause between two polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Endpoint probed on platforms without process-table discovery
    #[serde(default = "default_ping_url")]
    pub ping_url: String,
    /// Number of probe attempts
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,
    /// Per-attempt probe timeout
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
}

impl ReadinessConfig {
    /// Discovery window as a Duration
    pub fn discovery_window(&self) -> Duration {
        Duration::from_secs(self.discovery_window_secs)
    }

    /// Startup window as a Duration
    pub fn startup_window(&self) -> Duration {
        Duration::from_secs(self.startup_window_secs)
    }

    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Probe timeout as a Duration
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            discovery_window_secs: default_discovery_window_secs(),
            startup_window_secs: default_startup_window_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            ping_url: default_ping_url(),
            ping_attempts: default_ping_attempts(),
            ping_timeout_secs: default_ping_timeout_secs(),
        }
    }
}

/// Open file ceiling used when none (or a non-positive one) is configured
pub const DEFAULT_OPEN_FILES_LIMIT: u64 = 10000;

fn default_jdk_install_dir() -> String {
    "/usr/jdk64".to_string()
}

fn default_lib_dir() -> String {
    "/usr/lib/ignition".to_string()
}

fn default_pid_dir() -> String {
    "/var/run/ignition".to_string()
}

fn default_pid_file_name() -> String {
    "ignition-server.pid".to_string()
}

fn default_exit_code_file_name() -> String {
    "ignition-server.exitcode".to_string()
}

fn default_out_file() -> String {
    "/var/log/ignition/ignition-server.out".to_string()
}

fn default_log_file() -> String {
    "/var/log/ignition/ignition-server.log".to_string()
}

fn default_jvm_args() -> String {
    "-Xms512m -Xmx2048m".to_string()
}

const fn default_open_files_limit() -> i64 {
    DEFAULT_OPEN_FILES_LIMIT as i64
}

const fn default_debug_port() -> u16 {
    5005
}

fn default_shell_whitelist() -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "/bin/bash".to_string(),
        "/bin/dash".to_string(),
    ]
}

const fn default_discovery_window_secs() -> u64 {
    5
}

const fn default_startup_window_secs() -> u64 {
    10
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_ping_url() -> String {
    "http://127.0.0.1:8080/api/v1/ping".to_string()
}

const fn default_ping_attempts() -> u32 {
    4
}

const fn default_ping_timeout_secs() -> u64 {
    5
}
