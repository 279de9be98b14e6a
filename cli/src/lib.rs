//! Command implementations behind the `ignition` binary

pub mod error;

pub use error::{CliError, Result};

use ignition_core::config::load_launcher_config_from_path;
use ignition_core::pidfile::read_pid_record;
use ignition_core::status::LoggingListener;
use ignition_core::{StartReport, Supervisor};
use schema::{LauncherConfig, StartOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Default location of the launcher configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ignition/conf/ignition.toml";

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    load_launcher_config_from_path(path).map_err(|e| CliError::ConfigError(e.to_string()))
}

/// Start the server once and report where its pid was recorded
pub async fn start(config: LauncherConfig, options: &StartOptions) -> Result<StartReport> {
    let supervisor = Supervisor::new(config).with_status_listener(Arc::new(LoggingListener));
    let report = supervisor.start(options).await?;
    match &report.pid_record {
        Some(record) => info!(
            "Server PID {} recorded at {}",
            record.pid,
            report.pid_file.display()
        ),
        None => info!("Server launched as pid {}", report.handle.pid),
    }
    Ok(report)
}

/// One-line outcome of a start; names the confirmed server pid, not the launcher's
pub fn start_summary(report: &StartReport) -> String {
    match &report.pid_record {
        Some(record) => format!("Server started (pid {})", record.pid),
        None => format!(
            "Server launched (pid {}); readiness was not confirmed",
            report.handle.pid
        ),
    }
}

/// Pid of the running server according to the PID file
pub fn running_pid(config: &LauncherConfig) -> Result<u32> {
    let pid_file = pid_file(config);
    let record = read_pid_record(&pid_file)?.ok_or(CliError::NotRunning)?;
    if is_alive(record.pid) {
        Ok(record.pid)
    } else {
        Err(CliError::NotRunning)
    }
}

fn pid_file(config: &LauncherConfig) -> PathBuf {
    Path::new(&config.pid_dir).join(&config.pid_file_name)
}

#[cfg(any(unix, windows))]
fn is_alive(pid: u32) -> bool {
    ignition_core::process::pid_is_alive(pid)
}

#[cfg(not(any(unix, windows)))]
fn is_alive(_pid: u32) -> bool {
    false
}
