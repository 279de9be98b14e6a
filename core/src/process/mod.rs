//! Process management utilities for the launcher
//!
//! This module spawns the server command detached from the supervisor and
//! inspects the operating system's process table.
//!
//! ## Platform Support
//!
//! - **Unix**: the child gets its own session via `setsid()`; the process
//!   table is read from `/proc` and liveness is probed with signal 0
//! - **Windows**: the child is created with `DETACHED_PROCESS` and a new
//!   process group; no process-table discovery (readiness uses a probe)

use std::path::PathBuf;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::*;
#[cfg(windows)]
pub use windows::*;

/// One row of the process table that matched a search pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Process id
    pub pid: u32,
    /// Resolved executable, when readable
    pub exe: Option<PathBuf>,
    /// Command line with arguments joined by spaces
    pub cmdline: String,
}
