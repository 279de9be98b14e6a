//! Core of the ignition start supervisor
//!
//! Starts a JVM backend server as a detached daemon, under the right
//! identity, with its master key reachable through the environment, and
//! confirms that it came up. The [`supervisor::Supervisor`] drives the
//! sequence; the other modules are its collaborators.

pub mod checks;
pub mod config;
pub mod env;
pub mod error;
pub mod health;
pub mod host;
pub mod identity;
pub mod keys;
pub mod launcher;
pub mod pidfile;
pub mod platform;
#[cfg(any(unix, windows))]
pub mod process;
pub mod readiness;
pub mod runtime;
pub mod status;
pub mod supervisor;


// Re-export schema types for convenience
pub use schema::*;

pub use error::{CoreError, Result};
pub use platform::{LaunchCommand, Platform, PlatformFamily};
pub use status::{StatusListener, StatusReporter};
pub use supervisor::{StartReport, Supervisor};

/// Core utilities and helper functions
pub mod utils {
    use tracing::debug;

    /// Variable holding the tracing filter
    pub const LOG_FILTER_VAR: &str = "IGNITION_LOG";

    /// Initialize tracing; `IGNITION_LOG` wins over `level`
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| crate::CoreError::Other(format!("Failed to initialize tracing: {}", e)))?;

        debug!("Tracing initialized with level: {}", level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_tracing_init_is_an_error_not_a_panic() {
        let _ = utils::init_tracing("debug");
        assert!(utils::init_tracing("debug").is_err());
    }
}
