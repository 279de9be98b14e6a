//! PID file and exit-code file
//!
//! Both are plain text. The PID file holds the pid on its first line and,
//! for records produced via the detached-daemon path, the marker `daemon` on
//! the second. The exit-code file holds a single integer and is consumed on
//! read. Writes go through a temp file and a rename so a reader never sees a
//! half-written record.

use crate::{CoreError, Result};
use schema::{ExitRecord, PidRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

const DAEMON_MARKER: &str = "daemon";

/// Persist the confirmed server pid
pub fn write_pid_record(path: &Path, record: &PidRecord) -> Result<()> {
    let mut content = format!("{}\n", record.pid);
    if record.daemonized {
        content.push_str(DAEMON_MARKER);
        content.push('\n');
    }
    write_atomic(path, content.as_bytes())?;
    debug!("Wrote pid {} to {}", record.pid, path.display());
    Ok(())
}

/// Read the PID file; `Ok(None)` when it does not exist
pub fn read_pid_record(path: &Path) -> Result<Option<PidRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to read pid file {}: {}", path.display(), e),
            )))
        }
    };

    let mut lines = content.lines().map(str::trim);
    let pid = lines
        .next()
        .and_then(|l| l.parse::<u32>().ok())
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Pid file {} does not start with a positive pid",
                path.display()
            ))
        })?;
    let daemonized = lines.next() == Some(DAEMON_MARKER);
    Ok(Some(PidRecord { pid, daemonized }))
}

/// Persist the exit code of a launch that failed
pub fn write_exit_code(path: &Path, exit_code: i32) -> Result<()> {
    write_atomic(path, format!("{}\n", exit_code).as_bytes())?;
    debug!("Wrote exit code {} to {}", exit_code, path.display());
    Ok(())
}

/// Consume the exit-code file.
///
/// A missing or corrupt file yields [`ExitRecord::unknown`]. The file is
/// removed once read so a stale code never shows up in a later attempt.
pub fn read_exit_code(path: &Path) -> ExitRecord {
    let record = match fs::read_to_string(path) {
        Ok(content) => match content.trim().parse::<i32>() {
            Ok(exit_code) => ExitRecord { exit_code },
            Err(_) => {
                warn!("Exit code file {} is corrupt", path.display());
                ExitRecord::unknown()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => return ExitRecord::unknown(),
        Err(e) => {
            warn!("Unable to read exit code file {}: {}", path.display(), e);
            ExitRecord::unknown()
        }
    };
    if let Err(e) = fs::remove_file(path) {
        warn!("Unable to remove exit code file {}: {}", path.display(), e);
    }
    record
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CoreError::Other(format!("{} is not a file path", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| {
                CoreError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to open {}: {}", tmp_path.display(), e),
                ))
            })?;
        f.write_all(content)?;
        let _ = f.sync_all();
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        CoreError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to replace {}: {}", path.display(), e),
        ))
    })?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// RFC3339 timestamp with seconds precision
pub fn current_timestamp() -> String {
    humantime::format_rfc3339_seconds(std::time::SystemTime::now()).to_string()
}
