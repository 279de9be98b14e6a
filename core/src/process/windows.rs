//! Windows process spawning
//!
//! The child inherits identity and limits from the parent; it is created
//! without a console and in its own process group so it outlives the
//! supervisor.

use super::ProcessEntry;
use crate::platform::LaunchCommand;
use crate::{CoreError, Result};
use std::fs;
use std::os::windows::process::CommandExt;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error};

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// A child created detached from the supervisor's console
#[derive(Debug)]
pub struct DetachedChild {
    pid: u32,
    child: Child,
}

impl DetachedChild {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Try to collect the exit status without blocking
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessSpawn(format!("Failed to try_wait for process {}: {}", self.pid, e))
        })
    }

    /// Wait for the child to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessSpawn(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Terminate the child
    pub fn kill(&mut self) -> Result<()> {
        self.child
            .start_kill()
            .map_err(|e| CoreError::ProcessSpawn(format!("Failed to kill {}: {}", self.pid, e)))
    }
}

/// Spawn a launch command detached from the supervisor's console
pub fn spawn_detached(command: &LaunchCommand) -> Result<DetachedChild> {
    debug!("Spawning detached process: {}", command);

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);
    cmd.envs(&command.env);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    match &command.output_log {
        Some(path) => {
            let out = fs::OpenOptions::new().create(true).append(true).open(path)?;
            let err = out.try_clone()?;
            cmd.stdout(Stdio::from(out));
            cmd.stderr(Stdio::from(err));
        }
        None => {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }
    }
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);

    let child = cmd.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", command.program.display(), e);
        CoreError::ProcessSpawn(format!(
            "Failed to spawn '{}': {}",
            command.program.display(),
            e
        ))
    })?;
    let pid = child.id().unwrap_or(0);
    Ok(DetachedChild { pid, child })
}

/// Liveness by pid is not used on Windows; readiness is probed over the network
pub fn pid_is_alive(_pid: u32) -> bool {
    false
}

/// Process-table discovery is not used on Windows
pub fn scan_process_table(_pattern: &str) -> Vec<ProcessEntry> {
    Vec::new()
}
