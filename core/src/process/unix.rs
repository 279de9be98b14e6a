//! Unix process management: detached spawn, liveness and process-table scans
//!
//! The server command is spawned in a new session (via `setsid()`) so it
//! survives the supervisor and has no controlling terminal. The session
//! leader's pid doubles as the process group id, which lets a partially
//! started launch be torn down with a single group signal.

// Allow unsafe code for this module since daemonizing requires libc::setsid() calls
#![allow(unsafe_code)]

use super::ProcessEntry;
use crate::platform::LaunchCommand;
use crate::{CoreError, Result};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
#[allow(unused_imports)]
use std::os::unix::process::CommandExt;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error};

const PROC_DIR: &str = "/proc";

/// A child spawned in its own session
#[derive(Debug)]
pub struct DetachedChild {
    /// Session / process group leader pid
    pid: Pid,
    child: Child,
}

impl DetachedChild {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Try to collect the exit status without blocking
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessSpawn(format!(
                "Failed to try_wait for process {}: {}",
                self.pid, e
            ))
        })
    }

    /// Wait for the child to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessSpawn(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }
}

/// Spawn a launch command in its own session.
///
/// Output goes to the command's `output_log` when one is set; otherwise the
/// command is expected to redirect its own output and stdio is discarded.
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
            let out = open_output_log(path)?;
            let err = out.try_clone()?;
            cmd.stdout(Stdio::from(out));
            cmd.stderr(Stdio::from(err));
        }
        None => {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }
    }

    // Safety: setsid() is async-signal-safe and appropriate for use in pre_exec
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        cmd.pre_exec(|| {
            let result = libc::setsid();
            if result == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", command.program.display(), e);
        CoreError::ProcessSpawn(format!(
            "Failed to spawn '{}': {}",
            command.program.display(),
            e
        ))
    })?;

    // A child that already exited and was reaped has no id
    let raw_pid = child.id().unwrap_or(0);
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Spawned process {} in new session", pid);

    Ok(DetachedChild { pid, child })
}

fn open_output_log(path: &Path) -> Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            CoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to open output log {}: {}", path.display(), e),
            ))
        })
}

/// Send SIGKILL to the child's process group.
///
/// `ESRCH` and `EPERM` mean the group is already gone (or no longer ours) and
/// are treated as success.
pub fn signal_kill_group(child: &DetachedChild) -> Result<()> {
    debug!("Sending SIGKILL to process group {}", child.pid);

    match killpg(child.pid, Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to send SIGKILL to process group {}: {}", child.pid, e);
            Err(CoreError::ProcessSpawn(format!(
                "Failed to send SIGKILL to process group {}: {}",
                child.pid, e
            )))
        }
    }
}

/// Whether a process with this pid exists and is not a zombie
pub fn pid_is_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    let exists = match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // Exists but belongs to someone else
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    };
    exists && read_process_state(pid) != Some('Z')
}

/// State letter from `/proc/<pid>/stat`, when available
fn read_process_state(pid: u32) -> Option<char> {
    let content = fs::read_to_string(format!("{PROC_DIR}/{pid}/stat")).ok()?;
    // pid (comm) state ...
    let comm_end = content.rfind(')')?;
    content.get(comm_end + 2..)?.chars().next()
}

/// Scan `/proc` for processes whose command line contains `pattern`.
///
/// The supervisor's own pid is never returned. Processes that vanish while
/// being read are skipped.
pub fn scan_process_table(pattern: &str) -> Vec<ProcessEntry> {
    let own_pid = std::process::id();
    let Ok(entries) = fs::read_dir(PROC_DIR) else {
        debug!("{} is not readable; process table scan is empty", PROC_DIR);
        return Vec::new();
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ").trim().to_string();
        if cmdline.is_empty() || !cmdline.contains(pattern) {
            continue;
        }
        let exe = fs::read_link(entry.path().join("exe")).ok();
        found.push(ProcessEntry { pid, exe, cmdline });
    }
    found.sort_by_key(|e| e.pid);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn command(program: &str, args: &[&str]) -> LaunchCommand {
        LaunchCommand {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
            working_dir: Some(PathBuf::from("/")),
            output_log: None,
            exit_code_file: PathBuf::from("/tmp/unused.exitcode"),
        }
    }

    #[tokio::test]
    async fn test_spawn_in_own_session() {
        let child = spawn_detached(&command("sleep", &["2"])).expect("Failed to spawn sleep");
        assert!(child.pid() > 0);
        let pgid = nix::unistd::getpgid(Some(Pid::from_raw(child.pid() as i32))).unwrap();
        assert_eq!(pgid.as_raw() as u32, child.pid());
        let _ = signal_kill_group(&child);
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_command() {
        let result = spawn_detached(&command("nonexistent_command_12345", &[]));
        match result.unwrap_err() {
            CoreError::ProcessSpawn(_) => {}
            e => panic!("Expected ProcessSpawn error, got: {}", e),
        }
    }

    #[tokio::test]
    async fn test_output_log_receives_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let mut cmd = command("sh", &["-c", "echo to-stdout; echo to-stderr 1>&2"]);
        cmd.output_log = Some(log.clone());

        let mut child = spawn_detached(&cmd).expect("spawn");
        let status = child.wait().await.expect("wait");
        assert!(status.success());
        let content = fs::read_to_string(&log).unwrap();
        assert!(content.contains("to-stdout"));
        assert!(content.contains("to-stderr"));
    }

    #[tokio::test]
    async fn test_pid_is_alive() {
        assert!(pid_is_alive(std::process::id()));
        assert!(!pid_is_alive(0));

        let mut child = spawn_detached(&command("true", &[])).expect("spawn");
        let pid = child.pid();
        child.wait().await.expect("wait");
        assert!(!pid_is_alive(pid));
    }

    #[tokio::test]
    async fn test_kill_group_of_exited_child_is_ok() {
        let mut child = spawn_detached(&command("true", &[])).expect("spawn");
        child.wait().await.expect("wait");
        assert!(signal_kill_group(&child).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_scan_finds_matching_process() {
        let marker = format!("{}.{}", std::process::id(), 424242);
        let child = spawn_detached(&command("sleep", &[&marker])).expect("spawn");
        // give exec a moment to replace the forked image
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let found = scan_process_table(&marker);
        assert!(found.iter().any(|e| e.pid == child.pid()), "found: {:?}", found);
        assert!(scan_process_table("no-such-pattern-ignition-0000").is_empty());
        let _ = signal_kill_group(&child);
    }
}
