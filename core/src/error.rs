//! Core error types and utilities

use crate::health::HealthError;
use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The spawned process never got a usable pid
    #[error("Server process died with exitcode {exit_code}. Check {output_log} for more information.")]
    LaunchFailure { exit_code: i32, output_log: String },

    /// No live server process was confirmed inside the readiness windows
    #[error("Server process died with exitcode {exit_code}. Check {log_file} for more information.")]
    StartupTimeout { exit_code: i32, log_file: String },

    #[error("Process spawn error: {0}")]
    ProcessSpawn(String),

    #[error("Probe error: {0}")]
    Probe(#[from] HealthError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::LaunchFailure { .. } => "CORE003",
            CoreError::StartupTimeout { .. } => "CORE004",
            CoreError::ProcessSpawn(_) => "CORE005",
            CoreError::Probe(_) => "CORE006",
            CoreError::IoError(_) => "CORE007",
            CoreError::SerializationError(_) => "CORE008",
            CoreError::Other(_) => "CORE999",
        }
    }

    /// Exit code carried by launch and startup failures
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CoreError::LaunchFailure { exit_code, .. }
            | CoreError::StartupTimeout { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}
