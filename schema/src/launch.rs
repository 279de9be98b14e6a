//! Launch description types
//!
//! A [`LaunchSpec`] is built fresh for every launch attempt and never mutated
//! afterwards. It carries everything the command builder needs to turn the
//! configured server into a concrete argument vector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Remote-debugging switches for the server JVM
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DebugFlags {
    /// Start the JVM with the debug GC preset and a JDWP agent
    pub enabled: bool,
    /// Make the JDWP agent wait for a debugger before running `main`
    pub suspend: bool,
}

impl DebugFlags {
    /// Suspend indicator as expected by the JDWP agent (`y` or `n`)
    pub fn suspend_indicator(&self) -> char {
        if self.suspend {
            'y'
        } else {
            'n'
        }
    }
}

/// Options handed to the supervisor by its caller.
///
/// Every field is optional; an absent field means "not requested".
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// Start the server in remote-debug mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// Suspend the server JVM until a debugger attaches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend_start: Option<bool>,
    /// Verbose supervisor output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Immutable description of one launch attempt
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSpec {
    /// Path to the runtime executable (`<jdk>/bin/java`)
    pub executable_path: String,
    /// Classpath, already joined with the platform separator
    pub classpath: String,
    /// Fully-qualified main class of the server
    pub main_class: String,
    /// Heap and other operator-supplied JVM arguments, whitespace separated
    pub jvm_args: String,
    /// Optional provider module class (`-Dprovider.module.class=...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_module: Option<String>,
    /// Debug switches
    #[serde(default)]
    pub debug_flags: DebugFlags,
    /// Port of the JDWP agent when debugging
    pub debug_port: u16,
    /// File receiving the child's combined stdout and stderr
    pub output_log_path: String,
    /// File receiving the exit code when the child fails to start
    pub exit_code_file_path: String,
    /// Identity the server must run as
    pub run_as_user: String,
    /// Open file descriptor ceiling applied before the JVM starts (POSIX)
    pub open_files_limit: u64,
}
