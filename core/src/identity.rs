//! Invoking identity and run-as checks

use crate::{CoreError, Result};
use tracing::debug;

/// Identity of the process running the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Login name (or numeric uid when the name cannot be resolved)
    pub name: String,
    /// Whether the effective identity is root / elevated
    pub privileged: bool,
}

impl Identity {
    /// Construct an identity explicitly
    pub fn new(name: impl Into<String>, privileged: bool) -> Self {
        Self {
            name: name.into(),
            privileged,
        }
    }
}

/// Resolve the effective identity of the current process
#[cfg(unix)]
pub fn current_identity() -> Result<Identity> {
    use nix::unistd::{Uid, User};

    let uid = Uid::effective();
    let name = match User::from_uid(uid) {
        Ok(Some(user)) => user.name,
        Ok(None) => uid.to_string(),
        Err(e) => {
            return Err(CoreError::ConfigurationError(format!(
                "Failed to resolve user for uid {}: {}",
                uid, e
            )))
        }
    };
    debug!("Current identity: {} (uid {})", name, uid);
    Ok(Identity {
        name,
        privileged: uid.is_root(),
    })
}

/// Resolve the effective identity of the current process
#[cfg(not(unix))]
pub fn current_identity() -> Result<Identity> {
    let name = std::env::var("USERNAME").unwrap_or_else(|_| "unknown".to_string());
    debug!("Current identity: {}", name);
    Ok(Identity {
        name,
        privileged: false,
    })
}

/// Check that `current` may start the server as `run_as`.
///
/// The run-as identity must be configured, and the invoking identity must
/// either be that identity or be privileged.
pub fn ensure_can_start_as(run_as: Option<&str>, current: &Identity) -> Result<()> {
    let Some(run_as) = run_as else {
        return Err(CoreError::ConfigurationError(
            "Unable to detect a system user for the server. \
             Set runAsUser in the launcher configuration or rerun setup."
                .to_string(),
        ));
    };
    if current.name != run_as && !current.privileged {
        return Err(CoreError::ConfigurationError(format!(
            "Unable to start the server as user {}. Please either run \"ignition start\" \
             as root, as sudo or as user \"{}\"",
            current.name, run_as
        )));
    }
    Ok(())
}
