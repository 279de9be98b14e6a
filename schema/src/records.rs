//! Records produced while starting the server
//!
//! These are the values that outlive a single function call: the security
//! context resolved for the launch, the handle of the spawned process, the
//! persisted pid and exit code, and the phase signals reported to a service
//! control listener.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the master key for the server comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MasterKeySource {
    /// Persisted to the configured key location; nothing to do
    Persisted,
    /// Supplied through the master key environment variable
    Env,
    /// Supplied through a readable file named by the key-location variable
    File,
    /// Obtained interactively and written to a temporary file
    PromptedTemp,
}

/// Security context resolved once per launch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Whether password encryption (and therefore a master key) is enabled
    pub is_secure_mode_enabled: bool,
    /// Resolved key source; `None` when secure mode is disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_source: Option<MasterKeySource>,
    /// Key file path, when the key lives in a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_path: Option<String>,
}

impl SecurityContext {
    /// Context for a launch without secure mode
    pub fn disabled() -> Self {
        Self {
            is_secure_mode_enabled: false,
            master_key_source: None,
            master_key_path: None,
        }
    }
}

/// Handle of a process observed right after spawning
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    /// Process id, always strictly positive
    pub pid: u32,
    /// RFC3339 timestamp taken when the process was spawned
    pub start_timestamp: String,
}

/// Content of the PID file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PidRecord {
    /// Pid of the confirmed server process
    pub pid: u32,
    /// Produced via the detached-daemon path; stop logic must walk the
    /// process tree instead of trusting a remembered shell pid
    pub daemonized: bool,
}

/// Exit code persisted when the server dies before it could be confirmed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExitRecord {
    /// Reported exit code, [`ExitRecord::UNKNOWN`] when not obtainable
    pub exit_code: i32,
}

impl ExitRecord {
    /// Exit code used when nothing usable was recorded
    pub const UNKNOWN: i32 = -1;

    /// Record for an exit code that could not be determined
    pub fn unknown() -> Self {
        Self {
            exit_code: Self::UNKNOWN,
        }
    }
}

/// Phase signals reported to an external service-control listener
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StartupPhase {
    /// Startup is progressing; may be reported any number of times
    StartPending,
    /// Terminal success
    Started,
    /// Terminal failure path
    StopPending,
}

impl StartupPhase {
    /// Whether the phase ends the startup sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, StartupPhase::Started | StartupPhase::StopPending)
    }
}
