//! Process launcher
//!
//! [`ProcessLauncher`] executes a [`LaunchCommand`] detached from the
//! supervisor. [`launch_detached`] turns the spawned child into a
//! [`ProcessHandle`], or into a [`CoreError::LaunchFailure`] when no usable
//! pid was observed.

use crate::pidfile::{current_timestamp, write_exit_code};
use crate::platform::LaunchCommand;
use crate::status::StatusReporter;
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{ExitRecord, ProcessHandle};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// A child right after spawning
#[async_trait]
pub trait SpawnedChild: Send + fmt::Debug {
    /// Observed process id; anything `<= 0` means the launch failed
    fn raw_pid(&self) -> i64;

    /// Terminate whatever was started and collect its reported exit code
    async fn abort(&mut self) -> Option<i32>;
}

/// Executes launch commands as detached processes
#[async_trait]
pub trait ProcessLauncher: Send + Sync + fmt::Debug {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn SpawnedChild>>;
}

/// Launch `command` and validate the observed pid.
///
/// On a non-positive pid the partial process is torn down, its exit code is
/// written to the command's exit-code file, `StopPending` is reported and a
/// `LaunchFailure` naming `output_log` is returned.
pub async fn launch_detached(
    launcher: &dyn ProcessLauncher,
    command: &LaunchCommand,
    output_log: &Path,
    status: &StatusReporter,
) -> Result<ProcessHandle> {
    info!("Launching server: {}", command);
    let mut child = launcher.spawn(command).await?;
    let pid = child.raw_pid();

    if pid <= 0 || pid > i64::from(u32::MAX) {
        let exit_code = child.abort().await.unwrap_or(ExitRecord::UNKNOWN);
        if let Err(e) = write_exit_code(&command.exit_code_file, exit_code) {
            warn!(
                "Unable to record exit code in {}: {}",
                command.exit_code_file.display(),
                e
            );
        }
        status.stop_pending();
        let err = CoreError::LaunchFailure {
            exit_code,
            output_log: output_log.display().to_string(),
        };
        error!("{}", err);
        return Err(err);
    }

    debug!("Launcher process started with pid {}", pid);
    Ok(ProcessHandle {
        pid: pid as u32,
        start_timestamp: current_timestamp(),
    })
}

/// Launcher backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[derive(Debug)]
struct SystemChild(crate::process::DetachedChild);

#[async_trait]
impl SpawnedChild for SystemChild {
    fn raw_pid(&self) -> i64 {
        i64::from(self.0.pid())
    }

    async fn abort(&mut self) -> Option<i32> {
        #[cfg(unix)]
        if self.0.pid() > 0 {
            if let Err(e) = crate::process::signal_kill_group(&self.0) {
                warn!("Failed to stop partially started process: {}", e);
            }
        }
        #[cfg(windows)]
        if let Err(e) = self.0.kill() {
            warn!("Failed to stop partially started process: {}", e);
        }
        match self.0.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Unable to collect exit status: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn SpawnedChild>> {
        let child = crate::process::spawn_detached(command)?;
        Ok(Box::new(SystemChild(child)))
    }
}

/// Launcher that hands out a scripted pid and records what it was asked to run
#[derive(Debug, Clone)]
pub struct MockLauncher {
    pid: i64,
    exit_code: Option<i32>,
    commands: Arc<Mutex<Vec<LaunchCommand>>>,
    aborted: Arc<Mutex<usize>>,
}

impl MockLauncher {
    /// Every spawn reports `pid`; an aborted child reports `exit_code`
    pub fn new(pid: i64, exit_code: Option<i32>) -> Self {
        Self {
            pid,
            exit_code,
            commands: Arc::new(Mutex::new(Vec::new())),
            aborted: Arc::new(Mutex::new(0)),
        }
    }

    /// Commands passed to `spawn`, in order
    pub fn commands(&self) -> Vec<LaunchCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How many spawned children were aborted
    pub fn aborted(&self) -> usize {
        self.aborted.lock().map(|a| *a).unwrap_or(0)
    }
}

#[derive(Debug)]
struct MockChild {
    pid: i64,
    exit_code: Option<i32>,
    aborted: Arc<Mutex<usize>>,
}

#[async_trait]
impl SpawnedChild for MockChild {
    fn raw_pid(&self) -> i64 {
        self.pid
    }

    async fn abort(&mut self) -> Option<i32> {
        if let Ok(mut n) = self.aborted.lock() {
            *n += 1;
        }
        self.exit_code
    }
}

#[async_trait]
impl ProcessLauncher for MockLauncher {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn SpawnedChild>> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.clone());
        }
        Ok(Box::new(MockChild {
            pid: self.pid,
            exit_code: self.exit_code,
            aborted: self.aborted.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RecordingListener;
    use schema::StartupPhase;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn command(dir: &Path) -> LaunchCommand {
        LaunchCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "true".into()],
            env: BTreeMap::new(),
            working_dir: None,
            output_log: None,
            exit_code_file: dir.join("server.exitcode"),
        }
    }

    #[tokio::test]
    async fn positive_pid_becomes_handle() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MockLauncher::new(4321, None);
        let handle = launch_detached(
            &launcher,
            &command(dir.path()),
            Path::new("/var/log/out"),
            &StatusReporter::silent(),
        )
        .await
        .unwrap();

        assert_eq!(handle.pid, 4321);
        assert!(!handle.start_timestamp.is_empty());
        assert_eq!(launcher.commands().len(), 1);
        assert_eq!(launcher.aborted(), 0);
    }

    #[tokio::test]
    async fn non_positive_pid_records_exit_code_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let listener = Arc::new(RecordingListener::new());
        let status = StatusReporter::new(Some(listener.clone()));
        let launcher = MockLauncher::new(0, Some(127));

        let err = launch_detached(&launcher, &command(dir.path()), Path::new("/var/log/out"), &status)
            .await
            .unwrap_err();

        match err {
            CoreError::LaunchFailure {
                exit_code,
                ref output_log,
            } => {
                assert_eq!(exit_code, 127);
                assert_eq!(output_log, "/var/log/out");
            }
            ref other => panic!("expected LaunchFailure, got {:?}", other),
        }
        assert!(err.to_string().contains("/var/log/out"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("server.exitcode")).unwrap(),
            "127\n"
        );
        assert_eq!(launcher.aborted(), 1);
        assert_eq!(listener.calls(), vec![StartupPhase::StopPending]);
    }

    #[tokio::test]
    async fn unobtainable_exit_code_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MockLauncher::new(-1, None);
        let err = launch_detached(
            &launcher,
            &command(dir.path()),
            Path::new("/var/log/out"),
            &StatusReporter::silent(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), Some(-1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_launcher_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let mut cmd = command(dir.path());
        cmd.args = vec!["-c".into(), format!("touch {}", marker.display())];

        let child = SystemLauncher.spawn(&cmd).await.unwrap();
        assert!(child.raw_pid() > 0);
        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }
}
