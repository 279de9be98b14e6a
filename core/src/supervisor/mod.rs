//! Start supervisor
//!
//! [`Supervisor::start`] sequences one start attempt of the server:
//!
//! ```text
//! preflight checks (identity, JDK, driver, DBMS) → key material → command → launch → readiness → pid file
//! ```
//!
//! Configuration and identity problems abort before anything is spawned.
//! Once a process was attempted, failures are reported as `StopPending` on
//! the status listener before they propagate; success is reported as
//! `Started`. Nothing is retried.
//!
//! Every collaborator is a trait object with a system default, so the whole
//! sequence runs against mocks in tests:
//!
//! - [`Platform`]: command shape, identity rules, readiness strategy
//! - [`ProcessLauncher`]: detached spawn
//! - [`Readiness`]: overrides the platform's strategy when set
//! - [`StartupChecks`]: reverse lookup, driver, DBMS, stack hash
//! - [`MasterKeyPrompt`]: source of the original master key

use crate::checks::{DefaultStartupChecks, StartupChecks};
use crate::env::{EnvSnapshot, JVM_ARGS_VAR, PROVIDER_MODULE_VAR};
use crate::identity::{current_identity, Identity};
use crate::keys::{KeyProvisioner, KeyRequest, MasterKeyPrompt, StdinMasterKeyPrompt};
use crate::launcher::{launch_detached, ProcessLauncher, SystemLauncher};
use crate::pidfile::write_pid_record;
use crate::platform::{current_platform, LaunchCommand, Platform};
use crate::readiness::{Readiness, ReadinessOutcome};
use crate::runtime::{build_classpath, find_jdk};
use crate::status::{StatusListener, StatusReporter};
use crate::{CoreError, Result};
use schema::{
    DebugFlags, LaunchSpec, LauncherConfig, PidRecord, ProcessHandle, SecurityContext,
    StartOptions,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful start produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Handle of the launched process
    pub handle: ProcessHandle,
    /// Record written to the PID file; `None` when readiness stayed unconfirmed
    pub pid_record: Option<PidRecord>,
    /// Path of the PID file
    pub pid_file: PathBuf,
    /// Security context the server was started with
    pub security: SecurityContext,
}

/// Flags of one start attempt.
///
/// Missing debug/suspend options mean "off". Suspend without debug has no
/// effect on the command.
pub fn resolve_launch_flags(options: &StartOptions) -> DebugFlags {
    DebugFlags {
        enabled: options.debug.unwrap_or(false),
        suspend: options.suspend_start.unwrap_or(false),
    }
}

/// Orchestrates a single start of the server
pub struct Supervisor {
    config: LauncherConfig,
    env: EnvSnapshot,
    platform: Box<dyn Platform>,
    launcher: Box<dyn ProcessLauncher>,
    readiness: Option<Box<dyn Readiness>>,
    checks: Box<dyn StartupChecks>,
    prompt: Box<dyn MasterKeyPrompt>,
    identity: Option<Identity>,
    temp_dir: Option<PathBuf>,
    status: StatusReporter,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("main_class", &self.config.main_class)
            .field("platform", &self.platform)
            .field("launcher", &self.launcher)
            .field("identity", &self.identity)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Supervisor for the host platform with the process environment captured now
    pub fn new(config: LauncherConfig) -> Self {
        let env = EnvSnapshot::capture();
        let platform = current_platform(env.get("PATH"));
        Self {
            config,
            env,
            platform,
            launcher: Box::new(SystemLauncher),
            readiness: None,
            checks: Box::new(DefaultStartupChecks::new()),
            prompt: Box::new(StdinMasterKeyPrompt),
            identity: None,
            temp_dir: None,
            status: StatusReporter::silent(),
        }
    }

    pub fn with_platform(mut self, platform: Box<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replace the platform's readiness strategy
    pub fn with_readiness(mut self, readiness: Box<dyn Readiness>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    pub fn with_checks(mut self, checks: Box<dyn StartupChecks>) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_key_prompt(mut self, prompt: Box<dyn MasterKeyPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Use this identity instead of resolving the effective one
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = env;
        self
    }

    /// Directory for the temporary master key file
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_status_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.status = StatusReporter::new(Some(listener));
        self
    }

    /// The launcher configuration
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Path of the PID file
    pub fn pid_file(&self) -> PathBuf {
        Path::new(&self.config.pid_dir).join(&self.config.pid_file_name)
    }

    /// Path of the exit-code file
    pub fn exit_code_file(&self) -> PathBuf {
        Path::new(&self.config.pid_dir).join(&self.config.exit_code_file_name)
    }

    /// Run one start attempt
    pub async fn start(&self, options: &StartOptions) -> Result<StartReport> {
        let flags = resolve_launch_flags(options);
        if options.verbose.unwrap_or(false) {
            debug!("Verbose start requested");
        }
        debug!("Launch flags: {:?}", flags);

        let (identity, jdk) = self.preflight().await?;
        let (command, security) = self.prepare(flags, &identity, &jdk)?;
        self.ensure_pid_dir()?;

        let result = self.launch_and_confirm(&command).await;
        match result {
            Ok((handle, pid_record)) => {
                if pid_record.is_some() {
                    self.status.started();
                    info!("Server started with pid {}", handle.pid);
                } else {
                    warn!("Server launched as pid {} but readiness is unconfirmed", handle.pid);
                }
                Ok(StartReport {
                    handle,
                    pid_record,
                    pid_file: self.pid_file(),
                    security,
                })
            }
            Err(e) => {
                self.status.stop_pending();
                Err(e)
            }
        }
    }

    /// Everything that must hold before a command is built.
    ///
    /// Returns the identity and the JDK home; the first failing step aborts
    /// the rest.
    async fn preflight(&self) -> Result<(Identity, PathBuf)> {
        if !self.checks.reverse_lookup_ok() {
            warn!(
                "The hostname was not found in the reverse DNS lookup. This may result in \
                 incorrect behavior. Please check the DNS setup and fix the issue."
            );
        }

        self.checks.check_required_properties(&self.config)?;

        let identity = match &self.identity {
            Some(identity) => identity.clone(),
            None => current_identity()?,
        };
        self.platform
            .ensure_can_start(self.config.run_as_user.as_deref(), &identity)?;
        info!("Server is not running; starting as {}", identity.name);

        let jdk = find_jdk(&self.config, &self.env, self.platform.as_ref())?;
        debug!("Using JDK at {}", jdk.display());

        crate::config::validate(&self.config)?;

        if identity.privileged {
            warn!("Running the server as a privileged user is discouraged");
        }

        self.checks.ensure_driver(&self.config)?;
        self.status.start_pending();
        self.checks.ensure_dbms_reachable(&self.config).await?;
        self.status.start_pending();

        self.checks.refresh_stack_hash(&self.config)?;
        self.status.start_pending();

        self.platform.check_local_security(&identity);
        self.status.start_pending();

        Ok((identity, jdk))
    }

    /// Resolve the runtime executable, key material and the concrete command
    fn prepare(
        &self,
        flags: DebugFlags,
        identity: &Identity,
        jdk: &Path,
    ) -> Result<(LaunchCommand, SecurityContext)> {
        let platform = self.platform.as_ref();
        let java = platform.java_executable(jdk);
        let classpath = build_classpath(&self.config, platform)?;
        let run_as_user = self
            .config
            .run_as_user
            .clone()
            .unwrap_or_else(|| identity.name.clone());

        let mut provisioner = KeyProvisioner::new(self.prompt.as_ref(), platform.key_file_guard());
        if let Some(dir) = &self.temp_dir {
            provisioner = provisioner.with_temp_dir(dir);
        }
        let keys = provisioner.provision(
            &KeyRequest {
                security: &self.config.security,
                run_as_user: &run_as_user,
                current_user: &identity.name,
            },
            &self.env,
        )?;

        let spec = LaunchSpec {
            executable_path: java.display().to_string(),
            classpath,
            main_class: self.config.main_class.clone(),
            jvm_args: self
                .env
                .get_non_empty(JVM_ARGS_VAR)
                .unwrap_or(self.config.jvm_args.as_str())
                .to_string(),
            provider_module: self.env.get_non_empty(PROVIDER_MODULE_VAR).map(str::to_string),
            debug_flags: flags,
            debug_port: self.config.debug_port,
            output_log_path: self.config.out_file.clone(),
            exit_code_file_path: self.exit_code_file().display().to_string(),
            run_as_user,
            open_files_limit: self.config.effective_open_files_limit(),
        };
        let command = platform.build_command(&spec, identity, keys.env)?;
        Ok((command, keys.context))
    }

    fn ensure_pid_dir(&self) -> Result<()> {
        let dir = Path::new(&self.config.pid_dir);
        if dir.is_dir() {
            return Ok(());
        }
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(dir).map_err(|e| {
            CoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create pid dir {}: {}", dir.display(), e),
            ))
        })?;
        info!("Created pid dir {}", dir.display());
        Ok(())
    }

    async fn launch_and_confirm(
        &self,
        command: &LaunchCommand,
    ) -> Result<(ProcessHandle, Option<PidRecord>)> {
        let handle = launch_detached(
            self.launcher.as_ref(),
            command,
            Path::new(&self.config.out_file),
            &self.status,
        )
        .await?;

        let platform_readiness;
        let readiness: &dyn Readiness = match &self.readiness {
            Some(r) => r.as_ref(),
            None => {
                platform_readiness = self.platform.readiness(&self.config);
                platform_readiness.as_ref()
            }
        };

        match readiness.wait(&handle, &self.status).await? {
            ReadinessOutcome::Confirmed { record, confirmed } => {
                debug!("{} server process(es) confirmed", confirmed);
                write_pid_record(&self.pid_file(), &record)?;
                Ok((handle, Some(record)))
            }
            ReadinessOutcome::Unconfirmed => Ok((handle, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_flags_are_off() {
        assert_eq!(resolve_launch_flags(&StartOptions::default()), DebugFlags::default());
    }

    #[test]
    fn flags_follow_options() {
        let flags = resolve_launch_flags(&StartOptions {
            debug: Some(true),
            suspend_start: Some(true),
            verbose: None,
        });
        assert!(flags.enabled);
        assert_eq!(flags.suspend_indicator(), 'y');
    }

    #[test]
    fn file_paths_live_in_pid_dir() {
        let config = LauncherConfig {
            pid_dir: "/run/ignition".to_string(),
            ..Default::default()
        };
        let supervisor = Supervisor::new(config);
        assert_eq!(
            supervisor.pid_file(),
            PathBuf::from("/run/ignition/ignition-server.pid")
        );
        assert_eq!(
            supervisor.exit_code_file(),
            PathBuf::from("/run/ignition/ignition-server.exitcode")
        );
    }
}
