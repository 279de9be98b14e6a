//! Master key provisioning for the server process
//!
//! When password encryption is enabled and the master key is not persisted,
//! the server needs to find its key through its environment. This module
//! decides whether the inherited environment already provides one and, if
//! not, obtains the key interactively, writes it to a fixed-name file in the
//! temp directory and returns the environment override pointing at it.
//!
//! The temp key file outlives the start sequence; removing it is up to the
//! server or the operator.

use crate::env::{EnvOverrides, EnvSnapshot, MASTER_KEY_LOCATION_VAR, MASTER_KEY_VAR};
use crate::{CoreError, Result};
use schema::{MasterKeySource, SecurityConfig, SecurityContext};
use secrecy::{ExposeSecret, SecretString};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of a persisted master key inside `security.masterKeyLocation`
pub const PERSISTED_KEY_FILE_NAME: &str = "master";
/// File name of the temporary key file inside the temp directory
pub const TEMP_KEY_FILE_NAME: &str = "masterkey";

/// Source of the original master key when nothing else provides it
pub trait MasterKeyPrompt: Send + Sync {
    /// Obtain the master key, typically by asking the operator
    fn original_master_key(&self) -> Result<SecretString>;
}

/// Reads the master key from standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinMasterKeyPrompt;

impl MasterKeyPrompt for StdinMasterKeyPrompt {
    fn original_master_key(&self) -> Result<SecretString> {
        eprint!("Enter current Master Key: ");
        std::io::stderr().flush().ok();

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let key = line.trim_end_matches(['\r', '\n']);
        if key.is_empty() {
            return Err(CoreError::ConfigurationError(
                "Master key is required to start the server with encrypted passwords".to_string(),
            ));
        }
        Ok(SecretString::from(key.to_string()))
    }
}

/// Protects the temporary key file so only the server's identity can read it.
///
/// Both operations act on the open file, never on its path.
pub trait KeyFileGuard: Send + Sync {
    /// Hand the file over to `user` (and its primary group)
    fn transfer_ownership(&self, file: &File, user: &str) -> Result<()>;
    /// Restrict the file to owner read/write
    fn restrict_to_owner(&self, file: &File) -> Result<()>;
}

/// fchown/fchmod based guard
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixKeyFileGuard;

#[cfg(unix)]
impl KeyFileGuard for UnixKeyFileGuard {
    fn transfer_ownership(&self, file: &File, user: &str) -> Result<()> {
        use nix::unistd::User;

        let user = User::from_name(user)
            .map_err(|e| {
                CoreError::ConfigurationError(format!("Failed to look up user {}: {}", user, e))
            })?
            .ok_or_else(|| CoreError::ConfigurationError(format!("Unknown user {}", user)))?;
        std::os::unix::fs::fchown(file, Some(user.uid.as_raw()), Some(user.gid.as_raw())).map_err(
            |e| {
                CoreError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to hand the key file to {}: {}", user.name, e),
                ))
            },
        )?;
        Ok(())
    }

    fn restrict_to_owner(&self, file: &File) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(())
    }
}

/// Guard for platforms where the child inherits the caller's security context
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeyFileGuard;

impl KeyFileGuard for NoopKeyFileGuard {
    fn transfer_ownership(&self, _file: &File, _user: &str) -> Result<()> {
        Ok(())
    }

    fn restrict_to_owner(&self, _file: &File) -> Result<()> {
        Ok(())
    }
}

/// Outcome of looking at the configured and inherited key sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    /// Encryption disabled; no key needed
    Disabled,
    /// Key persisted at the given file
    Persisted(PathBuf),
    /// Key value present in the environment
    Env,
    /// Readable key file named by the environment
    File(PathBuf),
    /// Nothing usable; the key must be obtained and written out
    NeedsPrompt,
}

/// Decide where the master key comes from without writing anything.
///
/// An unreadable key file is not an error; it only means that source cannot
/// be used.
pub fn resolve_key_source(security: &SecurityConfig, env: &EnvSnapshot) -> KeyResolution {
    if !security.encryption_enabled {
        return KeyResolution::Disabled;
    }
    if let Some(loc) = &security.master_key_location {
        let persisted = Path::new(loc).join(PERSISTED_KEY_FILE_NAME);
        if persisted.is_file() {
            return KeyResolution::Persisted(persisted);
        }
    }
    if env.get_non_empty(MASTER_KEY_VAR).is_some() {
        return KeyResolution::Env;
    }
    match env.get(MASTER_KEY_LOCATION_VAR) {
        Some(location) => match File::open(location) {
            Ok(_) => KeyResolution::File(PathBuf::from(location)),
            Err(e) => {
                warn!(
                    "Cannot read master key from path specified in environment ({}): {}",
                    location, e
                );
                KeyResolution::NeedsPrompt
            }
        },
        None => KeyResolution::NeedsPrompt,
    }
}

/// Who the key file is for
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// Security section of the launcher config
    pub security: &'a SecurityConfig,
    /// Identity the server will run as
    pub run_as_user: &'a str,
    /// Identity running the supervisor
    pub current_user: &'a str,
}

/// Result of provisioning: the resolved context and the env to merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProvisioning {
    /// Resolved security context
    pub context: SecurityContext,
    /// Variables to add to the child's environment
    pub env: EnvOverrides,
}

/// Resolves and, if necessary, writes out the master key
pub struct KeyProvisioner<'a> {
    prompt: &'a dyn MasterKeyPrompt,
    guard: &'a dyn KeyFileGuard,
    temp_dir: PathBuf,
}

impl std::fmt::Debug for KeyProvisioner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyProvisioner")
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

impl<'a> KeyProvisioner<'a> {
    /// Provisioner writing into the system temp directory
    pub fn new(prompt: &'a dyn MasterKeyPrompt, guard: &'a dyn KeyFileGuard) -> Self {
        Self {
            prompt,
            guard,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Use a different directory for the temporary key file
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Path the temporary key file is written to
    pub fn temp_key_path(&self) -> PathBuf {
        self.temp_dir.join(TEMP_KEY_FILE_NAME)
    }

    /// Produce the environment overrides the child needs to find its key
    pub fn provision(&self, req: &KeyRequest<'_>, env: &EnvSnapshot) -> Result<KeyProvisioning> {
        let resolution = resolve_key_source(req.security, env);
        debug!("Master key resolution: {:?}", resolution);

        let (source, path) = match resolution {
            KeyResolution::Disabled => {
                return Ok(KeyProvisioning {
                    context: SecurityContext::disabled(),
                    env: EnvOverrides::new(),
                })
            }
            KeyResolution::Persisted(path) => (MasterKeySource::Persisted, Some(path)),
            KeyResolution::Env => (MasterKeySource::Env, None),
            KeyResolution::File(path) => (MasterKeySource::File, Some(path)),
            KeyResolution::NeedsPrompt => {
                let path = self.write_temp_key(req)?;
                let mut overrides = EnvOverrides::new();
                overrides.insert(
                    MASTER_KEY_LOCATION_VAR.to_string(),
                    path.display().to_string(),
                );
                return Ok(KeyProvisioning {
                    context: SecurityContext {
                        is_secure_mode_enabled: true,
                        master_key_source: Some(MasterKeySource::PromptedTemp),
                        master_key_path: Some(path.display().to_string()),
                    },
                    env: overrides,
                });
            }
        };

        Ok(KeyProvisioning {
            context: SecurityContext {
                is_secure_mode_enabled: true,
                master_key_source: Some(source),
                master_key_path: path.map(|p| p.display().to_string()),
            },
            env: EnvOverrides::new(),
        })
    }

    fn write_temp_key(&self, req: &KeyRequest<'_>) -> Result<PathBuf> {
        let key = self.prompt.original_master_key()?;
        let path = self.temp_key_path();
        let mut file = create_fresh(&path)?;

        if req.run_as_user != req.current_user {
            self.guard.transfer_ownership(&file, req.run_as_user)?;
        } else {
            self.guard.restrict_to_owner(&file)?;
        }
        file.write_all(key.expose_secret().as_bytes())?;
        file.flush()?;
        info!("Master key written to {}", path.display());
        Ok(path)
    }
}

/// Create `path` as a new owner-only file.
///
/// Whatever already sits at `path` (stale key, foreign file, symlink) is
/// unlinked first and the new file is created exclusively without following
/// links.
fn create_fresh(path: &Path) -> Result<File> {
    let open_error = |e: std::io::Error| {
        CoreError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to create temp key file {}: {}", path.display(), e),
        ))
    };

    if fs::symlink_metadata(path).is_ok() {
        debug!("Removing existing entry at {}", path.display());
        fs::remove_file(path).map_err(open_error)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600).custom_flags(libc::O_NOFOLLOW);
    }
    options.open(path).map_err(open_error)
}
